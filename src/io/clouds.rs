//! Replay of point-cloud frames stored as CSV files.
//!
//! A sequence is a directory of `*.csv` files, one frame per file, played in
//! file-name order. Each row is `x,y,z` or `x,y,z,r,g,b`; `#` starts a comment.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, Trim};
use nalgebra::Vector3;

use crate::tracking::{ObservedPoint, ObservedPointSet};

/// One loaded frame.
#[derive(Debug, Clone)]
pub struct CloudFrame {
    pub index: usize,
    pub name: String,
    pub cloud: ObservedPointSet,
}

#[derive(Debug)]
pub struct CloudSequence {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl CloudSequence {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = fs::read_dir(&root)
            .with_context(|| format!("Failed to list cloud directory {}", root.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "csv") {
                files.push(path);
            }
        }
        files.sort();

        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn frame(&self, idx: usize) -> Result<CloudFrame> {
        let path = self
            .files
            .get(idx)
            .with_context(|| format!("No cloud frame at index {}", idx))?;
        let cloud = load_cloud_csv(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(CloudFrame {
            index: idx,
            name,
            cloud,
        })
    }

    /// Frames in order; loading errors are yielded per frame.
    pub fn frames(&self) -> impl Iterator<Item = Result<CloudFrame>> + '_ {
        (0..self.len()).map(move |i| self.frame(i))
    }
}

/// Load one frame from a CSV file.
pub fn load_cloud_csv<P: AsRef<Path>>(path: P) -> Result<ObservedPointSet> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut points = Vec::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec?;
        if rec.len() < 3 {
            bail!("{}: row {} has {} fields, expected 3 or 6", path.display(), line, rec.len());
        }
        let position = Vector3::new(
            rec[0].parse::<f64>()?,
            rec[1].parse::<f64>()?,
            rec[2].parse::<f64>()?,
        );
        let point = if rec.len() >= 6 {
            let color = [rec[3].parse::<u8>()?, rec[4].parse::<u8>()?, rec[5].parse::<u8>()?];
            ObservedPoint::with_color(position, color)
        } else {
            ObservedPoint::new(position)
        };
        points.push(point);
    }

    ObservedPointSet::new(points).with_context(|| format!("Invalid cloud {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("phystrack_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_cloud_with_and_without_color() {
        let dir = scratch_dir("cloud");
        let path = dir.join("000.csv");
        fs::write(&path, "# x,y,z,r,g,b\n0.1, 0.2, 0.3\n1.0,2.0,3.0,255,128,0\n").unwrap();

        let cloud = load_cloud_csv(&path).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[0].color, None);
        assert_eq!(cloud.points()[1].color, Some([255, 128, 0]));
        assert_eq!(cloud.points()[1].position, Vector3::new(1.0, 2.0, 3.0));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_sequence_is_sorted_and_filtered() {
        let dir = scratch_dir("sequence");
        fs::write(dir.join("002.csv"), "0,0,2\n").unwrap();
        fs::write(dir.join("001.csv"), "0,0,1\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let seq = CloudSequence::new(&dir).unwrap();
        assert_eq!(seq.len(), 2);
        let frames: Vec<CloudFrame> = seq.frames().collect::<Result<_>>().unwrap();
        assert_eq!(frames[0].name, "001");
        assert_eq!(frames[1].cloud.points()[0].position.z, 2.0);
        assert!(seq.frame(5).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rejects_short_rows_and_nan() {
        let dir = scratch_dir("bad_cloud");
        let short = dir.join("short.csv");
        fs::write(&short, "1.0,2.0\n").unwrap();
        assert!(load_cloud_csv(&short).is_err());

        let nan = dir.join("nan.csv");
        fs::write(&nan, "NaN,0,0\n").unwrap();
        assert!(load_cloud_csv(&nan).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
