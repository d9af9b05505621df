#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use encoding_rs::UTF_8;
use sheetdash::{
    dataset::load_rows,
    row::{Row, RowSet},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file bytes");
        path
    }
}

pub const SALES_CSV: &str = "\
Region,Product,Sales,Units,Start,End,Owner
East,Widget,100,3,2024-01-01,2024-01-03,Ann
East,Gadget,abc,1,2024-01-02,2024-01-05,Bob
West,Widget,50,2,2024-01-04,2024-01-04,Ann
 ,Gadget,25,,2024-01-06,2024-01-01,
North,Widget,10,4,not a date,2024-01-09,Cy
,Widget,7,1,2024-01-02,2024-01-03,Dee
";

/// The sales fixture loaded through the CSV reader.
pub fn sales_rows() -> Arc<RowSet> {
    let workspace = TestWorkspace::new();
    let path = workspace.write("sales.csv", SALES_CSV);
    load_rows(&path, b',', UTF_8)
        .expect("load sales fixture")
        .shared()
}

/// `count` rows cycling through a few regions with numeric sales.
pub fn generated_rows(count: usize) -> Arc<RowSet> {
    const REGIONS: [&str; 4] = ["East", "West", "North", "South"];
    RowSet::from_rows(
        (0..count)
            .map(|i| {
                Row::new()
                    .with("Region", REGIONS[i % REGIONS.len()])
                    .with("Sales", (i % 97) as f64)
            })
            .collect(),
    )
    .shared()
}
