//! Upstream image-generation API adapter (C2): a `reqwest` client over the
//! standard and Lumina `make_image`/`artifact/task` endpoints, grounded in
//! `original_source/backend/dramatiq_app/actors/test_run_subtask.py`.

pub mod client;

pub use client::{ImageApiConfig, ReqwestImageApiClient};
