pub mod binary_stream;
pub mod coff;
pub mod dll_oracle;
pub mod error;
pub mod import_synth;
pub mod layout;
pub mod object_file;
pub mod options;
pub mod pe_writer;
pub mod relocate;
pub mod resolver;
pub mod section_aggregator;

use crate::error::{LinkError, Result};
use crate::layout::LayoutResult;
use crate::object_file::ObjectFile;
use crate::options::LinkerOptions;
use crate::pe_writer::PeWriteParams;
use std::path::Path;

/// Everything the pipeline produces once linking succeeds, short of the
/// final write: the laid-out image and the optional-header parameters
/// `pe_writer` needs. Kept separate from `write_pe` so the CLI binary can
/// tell an object-read/link failure (exit 2/3, §6.3) from a write failure
/// (exit 4) by which stage raised it, rather than by error variant.
pub struct LinkedImage {
    pub layout: LayoutResult,
    pub params: PeWriteParams,
}

/// Runs C3 through C9: reads every object, aggregates and lays out
/// sections, resolves symbols, synthesizes imports, and patches
/// relocations. Does not touch the output file.
pub fn prepare(options: &mut LinkerOptions) -> Result<LinkedImage> {
    let mut objects = Vec::with_capacity(options.object_paths.len());
    for path in &options.object_paths {
        log::debug!("reading object {path}");
        objects.push(ObjectFile::read_from_path(Path::new(path))?);
    }

    prepare_objects(&objects, options)
}

fn prepare_objects(objects: &[ObjectFile], options: &mut LinkerOptions) -> Result<LinkedImage> {
    log::debug!("aggregating sections from {} object(s)", objects.len());
    let merged = section_aggregator::aggregate(objects);
    let laid_out = layout::layout(merged, options.section_alignment, options.file_alignment);

    let mut resolver_map = resolver::resolve(objects, &laid_out.translation)?;

    log::debug!("discovering imports");
    let (mut laid_out, import_layout) = import_synth::synthesize_imports(
        objects,
        laid_out,
        &mut resolver_map,
        &mut options.oracle,
        options.dllwarn,
        options.image_base,
    )?;

    relocate::apply_relocations(
        objects,
        &mut laid_out,
        &resolver_map,
        &import_layout,
        options.image_base,
    )?;

    let entry = resolver_map.get(&options.entry_symbol).ok_or_else(|| {
        LinkError::Resolution(format!("couldn't find entry point '{}'", options.entry_symbol))
    })?;
    let entry_point_rva =
        laid_out.sections[entry.section_index].header.virtual_address + entry.offset;

    let [import_directory, iat_directory] = import_synth::data_directories_for(&import_layout);

    let params = PeWriteParams {
        image_base: options.image_base,
        section_alignment: laid_out.section_alignment,
        file_alignment: laid_out.file_alignment,
        entry_point_rva,
        stack_reserve: options.stack_reserve,
        stack_commit: options.stack_commit,
        heap_reserve: options.heap_reserve,
        heap_commit: options.heap_commit,
        subsystem: options.subsystem.raw(),
        import_directory,
        iat_directory,
    };

    Ok(LinkedImage { layout: laid_out, params })
}

/// C10: writes a prepared image to `output_path`.
pub fn write(image: &LinkedImage, output_path: &str) -> Result<()> {
    pe_writer::write_pe(Path::new(output_path), &image.layout, &image.params)
}

/// Convenience wrapper running the whole pipeline end to end; equivalent
/// to `prepare` followed by `write`.
pub fn link(options: &mut LinkerOptions) -> Result<()> {
    let image = prepare(options)?;
    write(&image, &options.output_path)
}
