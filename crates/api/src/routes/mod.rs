pub mod health;
pub mod job_runs;
pub mod jobs;
pub mod metrics;
