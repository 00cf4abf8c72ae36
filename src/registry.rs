//! Registration of the importer with a host-owned plugin registry.

use crate::importer::DicomPlugin;

use log::debug;
use std::collections::BTreeMap;

/// Name the importer is registered under.
pub const PLUGIN_NAME: &str = "MultiVolumeImporterPlugin";

/// DICOM import plugins known to the host, by name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Box<dyn DicomPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `plugin` under `name`, returning the plugin it replaces.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        plugin: Box<dyn DicomPlugin>,
    ) -> Option<Box<dyn DicomPlugin>> {
        self.plugins.insert(name.into(), plugin)
    }

    pub fn get(&self, name: &str) -> Option<&dyn DicomPlugin> {
        self.plugins.get(name).map(|plugin| &**plugin)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Registration hook: insert the multivolume importer into `registry`.
pub fn register(registry: &mut PluginRegistry, plugin: impl DicomPlugin + 'static) {
    debug!("Registering {PLUGIN_NAME}");
    registry.register(PLUGIN_NAME, Box::new(plugin));
}

/// Module description shown by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct PluginInfo {
    pub title: &'static str,
    pub categories: Vec<&'static str>,
    pub contributors: Vec<&'static str>,
    pub help_text: &'static str,
    pub acknowledgement_text: &'static str,
    /// The plugin only appears inside the host's DICOM module.
    pub hidden: bool,
}

impl PluginInfo {
    pub fn multivolume_importer() -> Self {
        Self {
            title: "DICOM MultiVolume Import Plugin",
            categories: vec!["Developer Tools.DICOM Plugins"],
            contributors: vec!["Andrey Fedorov, BWH"],
            help_text: "Plugin to the DICOM Module to parse and load MultiVolume data from \
                        DICOM files. No module interface here, only in the DICOM module.",
            acknowledgement_text: "This DICOM Plugin was developed by Andrey Fedorov, BWH, \
                                   and was partially funded by NIH grant U01CA151261.",
            hidden: true,
        }
    }
}

/// The importer has no user interface of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImporterWidget;

impl ImporterWidget {
    pub fn setup(&mut self) {}

    pub fn enter(&mut self) {}

    pub fn exit(&mut self) {}
}
