//! Precompiled shader bytecode
//!
//! Bytecode is opaque: the renderer never compiles shaders. Blobs are loaded
//! from a directory holding `vertex.cso` plus one `<program>.cso` per pixel
//! or converter program.

use crate::error::{Error, Result};
use crate::types::{ConverterShader, PixelShader, ShaderProgram};
use std::path::Path;
use std::sync::Arc;

/// File stem of the shared quad vertex shader
pub const VERTEX_SHADER_STEM: &str = "vertex";

/// Extension of compiled shader objects
pub const SHADER_EXTENSION: &str = "cso";

/// Bytecode for every program the renderer and converters may bind
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    vertex: Option<Arc<[u8]>>,
    pixel: [Option<Arc<[u8]>>; PixelShader::COUNT],
    converter: [Option<Arc<[u8]>>; ConverterShader::COUNT],
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the vertex shader blob
    pub fn with_vertex(mut self, bytecode: impl Into<Arc<[u8]>>) -> Self {
        self.vertex = Some(bytecode.into());
        self
    }

    /// Set the blob of one pixel or converter program
    pub fn with_program(mut self, program: impl Into<ShaderProgram>, bytecode: impl Into<Arc<[u8]>>) -> Self {
        *self.slot_mut(program.into()) = Some(bytecode.into());
        self
    }

    /// Load every blob found in `dir`; absent files are skipped
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "shader directory {} does not exist",
                dir.display()
            )));
        }

        let mut library = Self::new();
        library.vertex = read_blob(dir, VERTEX_SHADER_STEM)?;
        for program in all_programs() {
            *library.slot_mut(program) = read_blob(dir, program.file_stem())?;
        }

        tracing::info!(
            "Loaded shaders from {} ({} missing)",
            dir.display(),
            library.missing().len()
        );
        Ok(library)
    }

    pub fn vertex(&self) -> Result<&[u8]> {
        self.vertex
            .as_deref()
            .ok_or_else(|| Error::ShaderMissing(VERTEX_SHADER_STEM.to_string()))
    }

    pub fn program(&self, program: impl Into<ShaderProgram>) -> Result<&[u8]> {
        let program = program.into();
        self.slot(program)
            .as_deref()
            .ok_or_else(|| Error::ShaderMissing(program.to_string()))
    }

    pub fn has_program(&self, program: impl Into<ShaderProgram>) -> bool {
        self.slot(program.into()).is_some()
    }

    /// File stems of the blobs that are not loaded
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.vertex.is_none() {
            missing.push(VERTEX_SHADER_STEM);
        }
        missing.extend(
            all_programs()
                .filter(|p| self.slot(*p).is_none())
                .map(|p| p.file_stem()),
        );
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    fn slot(&self, program: ShaderProgram) -> &Option<Arc<[u8]>> {
        match program {
            ShaderProgram::Pixel(shader) => &self.pixel[shader.index()],
            ShaderProgram::Converter(shader) => &self.converter[shader.index()],
        }
    }

    fn slot_mut(&mut self, program: ShaderProgram) -> &mut Option<Arc<[u8]>> {
        match program {
            ShaderProgram::Pixel(shader) => &mut self.pixel[shader.index()],
            ShaderProgram::Converter(shader) => &mut self.converter[shader.index()],
        }
    }
}

/// Every pixel and converter program, in index order
pub fn all_programs() -> impl Iterator<Item = ShaderProgram> {
    PixelShader::ALL
        .into_iter()
        .map(ShaderProgram::from)
        .chain(ConverterShader::ALL.into_iter().map(ShaderProgram::from))
}

fn read_blob(dir: &Path, stem: &str) -> Result<Option<Arc<[u8]>>> {
    let path = dir.join(stem).with_extension(SHADER_EXTENSION);
    if !path.is_file() {
        tracing::debug!("Shader {} not found", path.display());
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    if bytes.is_empty() {
        return Err(Error::ShaderCreation(format!("{} is empty", path.display())));
    }
    Ok(Some(bytes.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_errors() {
        let library = ShaderLibrary::new().with_vertex(vec![1u8, 2, 3]);
        assert!(library.vertex().is_ok());
        let err = library.program(PixelShader::Sharpen).unwrap_err();
        assert!(matches!(err, Error::ShaderMissing(ref name) if name == "sharpen"));
    }

    #[test]
    fn test_with_program() {
        let library = ShaderLibrary::new()
            .with_program(PixelShader::Nv12Bt709, vec![9u8; 4])
            .with_program(ConverterShader::RgbToYuv420, vec![5u8; 2]);
        assert_eq!(library.program(PixelShader::Nv12Bt709).unwrap(), &[9, 9, 9, 9]);
        assert!(library.has_program(ConverterShader::RgbToYuv420));
        assert!(!library.has_program(ConverterShader::Yuv444Combine));
        // vertex + 5 pixel + 2 converter programs missing
        assert_eq!(library.missing().len(), 8);
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vertex.cso"), [0xdu8, 0xb, 0xc]).unwrap();
        std::fs::write(dir.path().join("argb.cso"), [1u8]).unwrap();
        std::fs::write(dir.path().join("rgb_to_chroma420.cso"), [2u8]).unwrap();

        let library = ShaderLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(library.vertex().unwrap(), &[0xd, 0xb, 0xc]);
        assert_eq!(library.program(PixelShader::Argb).unwrap(), &[1]);
        assert_eq!(library.program(ConverterShader::RgbToChroma420).unwrap(), &[2]);
        assert!(!library.is_complete());
        assert!(library.missing().contains(&"yuv_bt601"));
    }

    #[test]
    fn test_load_dir_rejects_empty_blob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sharpen.cso"), [0u8; 0]).unwrap();
        assert!(ShaderLibrary::load_dir(dir.path()).is_err());
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(ShaderLibrary::load_dir(missing), Err(Error::Config(_))));
    }
}
