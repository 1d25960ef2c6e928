//! Pre-authored path library for non-human participants.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{Vec3, MIN_PATH_POINTS};
use std::path::Path;

/// An ordered list of ordered point sequences, loaded once at process
/// start. Bots pick from it uniformly at random; humans author their own
/// paths and never touch this.
pub struct PathLibrary {
    paths: Vec<Vec<Vec3>>,
}

impl PathLibrary {
    /// Loads the library from a JSON file, falling back to the compiled-in
    /// defaults when no file is given or the file cannot be used.
    pub fn load(file: Option<&Path>) -> Self {
        match file {
            Some(file) => match Self::from_file(file) {
                Ok(library) => {
                    info!(
                        "Loaded {} pre-authored paths from {}",
                        library.len(),
                        file.display()
                    );
                    library
                }
                Err(e) => {
                    warn!(
                        "Failed to load path library from {}: {}, using defaults",
                        file.display(),
                        e
                    );
                    Self::defaults()
                }
            },
            None => Self::defaults(),
        }
    }

    fn from_file(file: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(file)?;
        let paths: Vec<Vec<Vec3>> = serde_json::from_str(&data)?;
        Ok(Self::from_paths(paths))
    }

    /// Keeps only sequences long enough to be a legal path.
    fn from_paths(paths: Vec<Vec<Vec3>>) -> Self {
        let mut kept = Vec::new();
        for (index, path) in paths.into_iter().enumerate() {
            if path.len() < MIN_PATH_POINTS {
                warn!("Skipping authored path {} with {} points", index, path.len());
                continue;
            }
            kept.push(path);
        }
        Self { paths: kept }
    }

    pub fn defaults() -> Self {
        Self {
            paths: vec![
                vec![
                    Vec3::new(-4.0, 0.0, -4.0),
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(4.0, 0.0, 4.0),
                ],
                vec![
                    Vec3::new(4.0, 0.0, -4.0),
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(-4.0, 0.0, 4.0),
                ],
                vec![
                    Vec3::new(-4.0, 0.0, 0.0),
                    Vec3::new(4.0, 0.0, 0.0),
                ],
                vec![
                    Vec3::new(0.0, 0.0, -4.0),
                    Vec3::new(0.0, 0.0, 4.0),
                ],
            ],
        }
    }

    pub fn pick_random(&self, rng: &mut StdRng) -> Option<&Vec<Vec3>> {
        if self.paths.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.paths.len());
        self.paths.get(index)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
