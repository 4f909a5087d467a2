//! Completion of output specs from build options.

use crate::options::{AmdOptions, OutputOptions};

/// Declares the inherited fields once: the public list of their option
/// names and the function copying them.
macro_rules! inherited_fields {
    ($($field:ident => $key:literal),+ $(,)?) => {
        /// Build-level fields that also act as output-level defaults.
        ///
        /// `name` and `amd` are absent on purpose: they get their own defaults.
        pub const INHERITED_FIELDS: &[&str] = &[$($key),+];

        fn inherit_unset(merged: &mut OutputOptions, build: &OutputOptions) {
            $(
                if merged.$field.is_none() {
                    merged.$field = build.$field.clone();
                }
            )+
        }
    };
}

inherited_fields! {
    // core options
    dir => "dir",
    file => "file",
    format => "format",
    globals => "globals",
    // advanced options
    asset_file_names => "assetFileNames",
    banner => "banner",
    chunk_file_names => "chunkFileNames",
    compact => "compact",
    entry_file_names => "entryFileNames",
    extend => "extend",
    footer => "footer",
    interop => "interop",
    intro => "intro",
    outro => "outro",
    paths => "paths",
    sourcemap => "sourcemap",
    sourcemap_exclude_sources => "sourcemapExcludeSources",
    sourcemap_file => "sourcemapFile",
    sourcemap_path_transform => "sourcemapPathTransform",
    // danger zone
    es_module => "esModule",
    exports => "exports",
    freeze => "freeze",
    indent => "indent",
    namespace_to_string_tag => "namespaceToStringTag",
    no_conflict => "noConflict",
    prefer_const => "preferConst",
    strict => "strict",
}

/// Produce the fully merged options for one output spec.
///
/// 1. Unset [`INHERITED_FIELDS`] are copied from `build`.
/// 2. `name` defaults to the build-level name, then to `module_name`.
///    Formats like UMD and IIFE need it, and the engine would otherwise
///    pick a default silently.
/// 3. `amd.id` defaults to the resolved name.
/// 4. `sourcemap` follows `source_maps`, whatever the user asked for;
///    attaching the map downstream depends on it.
pub fn merge_output_options(
    spec: &OutputOptions,
    build: &OutputOptions,
    module_name: &str,
    source_maps: bool,
) -> OutputOptions {
    let mut merged = spec.clone();

    inherit_unset(&mut merged, build);

    let name = merged
        .name
        .clone()
        .or_else(|| build.name.clone())
        .unwrap_or_else(|| module_name.to_string());

    if merged.amd_id().is_none() {
        let amd = merged.amd.get_or_insert_with(AmdOptions::default);
        amd.id = Some(name.clone());
    }

    merged.name = Some(name);
    merged.sourcemap = Some(source_maps);
    merged
}
