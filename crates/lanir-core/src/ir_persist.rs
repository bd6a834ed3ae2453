use crate::function::Shader;
use std::fs;
use std::io;
use std::path::Path;

pub fn save_shader(shader: &Shader, path: impl AsRef<Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(shader)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    fs::write(path, json)?;
    Ok(())
}

pub fn load_shader(path: impl AsRef<Path>) -> io::Result<Shader> {
    let json = fs::read_to_string(path)?;
    let shader =
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    Ok(shader)
}
