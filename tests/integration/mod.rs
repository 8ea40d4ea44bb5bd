//! Integration Tests Module
//!
//! This module contains end-to-end tests for the document question answering
//! engine. Tests cover the full ingest/query/delete flow over the local
//! providers, retrieval quality of the approximate index against the exact
//! scan, and index persistence across restarts.

// Full pipeline flows over the hashing embedder and the stub chat model
mod rag_flow_test;

// Approximate-index recall against brute force, and graph persistence
mod recall_test;
