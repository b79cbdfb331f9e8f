//! Sample blobs shared by the unit tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::context::StoryContext;
use crate::crypto::MEDIA_CIPHER;

pub const KEY: [u8; 32] = [0x42; 32];
pub const IV: [u8; 16] = [0x24; 16];

pub fn png() -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend_from_slice(b"\x00\x00\x00\x0dIHDR\x00\x00\x00\x01\x00\x00\x00\x01\x08\x06");
    data
}

pub fn jpeg() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    data.extend_from_slice(b"JFIF\x00\x01\x01");
    data
}

pub fn mp4() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypmp42\x00\x00\x00\x00mp42isom");
    data
}

pub fn zip(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    build_zip(None, files)
}

pub fn zip_with_dir(dir: &str, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    build_zip(Some(dir), files)
}

fn build_zip(dir: Option<&str>, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    if let Some(dir) = dir {
        writer.add_directory(dir, options).unwrap();
    }
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    MEDIA_CIPHER.encrypt(plaintext, &KEY, &IV)
}

pub fn story() -> StoryContext {
    StoryContext::new(KEY.to_vec(), IV.to_vec())
}
