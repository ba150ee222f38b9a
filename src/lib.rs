//! Case Dialogue - Conversation orchestration for AI case discussions
//!
//! A learner argues a business case with an AI-played protagonist, answers a
//! short feedback questionnaire, and receives a rubric evaluation. This crate
//! implements the phase state machine, provider-agnostic AI sessions, the
//! cache-ordered prompt assembly and the evaluation call.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
