use std::path::PathBuf;

use dicom_multivolume::{
    DicomMultiVolumeImporter, DicomPlugin, ImporterOptions, MemoryScene, StaticSettings,
};
use log::{error, info};

fn main() {
    env_logger::init();

    let directory = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("dicom"));
    let files: Vec<PathBuf> = match std::fs::read_dir(&directory) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect(),
        Err(err) => {
            error!("Failed to list {}: {err}", directory.display());
            std::process::exit(1);
        }
    };

    let importer =
        DicomMultiVolumeImporter::dicom(StaticSettings::default(), ImporterOptions::new());
    let candidates = importer.examine(&[files]);
    for candidate in &candidates {
        info!("Found: {}", candidate.name);
    }

    let mut scene = MemoryScene::new();
    let Some(mut candidate) = candidates.into_iter().find(|c| c.selected) else {
        info!("No multivolumes in {}", directory.display());
        return;
    };
    if !importer.load(&mut candidate, &mut scene) {
        std::process::exit(1);
    }
    for multivolume in scene.multi_volumes() {
        info!(
            "{}: {} frames of {:?} voxels",
            multivolume.name,
            multivolume.n_frames(),
            multivolume.dim().unwrap_or_default()
        );
    }
}
