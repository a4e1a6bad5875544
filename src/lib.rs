//! This crate converts spike recordings stored in MATLAB files into HDF5 datasets for sequence models.
//!
//! # Converting a Session
//!
//! A session file holds one spike table per cell (rows of spike time and trial id) and the ids of
//! the valid trials. Each valid trial is summarized by its latest spike time across all cells, and
//! the summaries are split at random into train, validation and test subsets.
//!
//! ```no_run
//! use spike2h5::config::Config;
//! use spike2h5::pipeline;
//!
//! let config = Config {
//!     data_dir: "sessions".into(),
//!     session_index: 0,
//!     seed: Some(42),
//!     ..Config::default()
//! };
//! let summary = pipeline::convert(&config).unwrap();
//! println!("{} trials written to {}", summary.num_trials, summary.output.display());
//! ```
//!
//! # Splitting
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use spike2h5::split::{SplitIndices, SplitRatios, Subset};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let summaries = vec![1.5; 20];
//! let split = SplitIndices::rand(summaries.len(), &SplitRatios::default(), &mut rng);
//!
//! assert_eq!(split.train.len(), 16);
//! assert_eq!(split.valid.len(), 2);
//! assert_eq!(split.test.len(), 2);
//! assert_eq!(split.gather(Subset::Valid, &summaries), vec![1.5, 1.5]);
//! ```

pub mod cell_class;
pub mod config;
pub mod error;
pub mod mat;
pub mod persist;
pub mod pipeline;
pub mod session;
pub mod split;
pub mod trial;
pub mod verify;
