//! Trend sources feeding the publishing pipeline.
//!
//! Each source module exposes a `collect_topics` function returning a flat,
//! deduplicated sequence of [`crate::models::Topic`]s. The category hint
//! attached to each topic is chosen here, not by the source. Failed
//! sections are logged and contribute nothing; the pipeline aborts only
//! when every source comes back empty.

pub mod naver;
