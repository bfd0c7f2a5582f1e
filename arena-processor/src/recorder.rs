//! Movie recording of annotated scenes.
//!
//! Frames go to disk in the FMF v3 container: a tiny header followed by
//! fixed-size chunks of `f64` timestamp plus raw pixel bytes, so individual
//! frames stay randomly accessible and no codec is involved. The frame
//! count in the header is back-patched on close.

use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use machine_vision_formats::{pixel_format::RGB8, ImageStride};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("frame size does not match the recording")]
    UnexpectedSize,
    #[error("recorder already closed")]
    AlreadyClosed,
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

const FMF_VERSION: u32 = 3;
const FORMAT: &[u8] = b"RGB8";
const BITS_PER_PIXEL: u32 = 24;

struct Header {
    width: u32,
    height: u32,
    n_frames_pos: u64,
}

/// Writes annotated scenes to an FMF v3 movie.
///
/// The header is written lazily on the first frame, which fixes the frame
/// dimensions for the rest of the recording.
pub struct MovieRecorder<F: Write + Seek> {
    f: Option<F>,
    header: Option<Header>,
    n_frames: u64,
}

impl MovieRecorder<std::fs::File> {
    pub fn create<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::create(path)?;
        Ok(Self::new(f))
    }
}

impl<F: Write + Seek> MovieRecorder<F> {
    pub fn new(f: F) -> Self {
        MovieRecorder {
            f: Some(f),
            header: None,
            n_frames: 0,
        }
    }

    pub fn n_frames(&self) -> u64 {
        self.n_frames
    }

    /// Append one frame stamped with `timestamp` (seconds).
    pub fn write_frame<IM>(&mut self, frame: &IM, timestamp: f64) -> Result<()>
    where
        IM: ImageStride<RGB8>,
    {
        let f = self.f.as_mut().ok_or(Error::AlreadyClosed)?;

        if self.header.is_none() {
            self.header = Some(write_header(f, frame.width(), frame.height())?);
        }
        let header = self.header.as_ref().unwrap();
        if frame.width() != header.width || frame.height() != header.height {
            return Err(Error::UnexpectedSize);
        }

        f.write_f64::<LittleEndian>(timestamp)?;
        let row_bytes = header.width as usize * 3;
        let stride = frame.stride();
        let data = frame.image_data();
        for row in 0..header.height as usize {
            let start = row * stride;
            f.write_all(&data[start..start + row_bytes])?;
        }
        self.n_frames += 1;
        Ok(())
    }

    /// Back-patch the frame count and return the underlying writer.
    pub fn close(mut self) -> Result<F> {
        self.finish()?;
        self.f.take().ok_or(Error::AlreadyClosed)
    }

    fn finish(&mut self) -> Result<()> {
        let Some(f) = self.f.as_mut() else {
            return Ok(());
        };
        if let Some(header) = &self.header {
            f.seek(SeekFrom::Start(header.n_frames_pos))?;
            f.write_u64::<LittleEndian>(self.n_frames)?;
            f.seek(SeekFrom::End(0))?;
        }
        f.flush()?;
        Ok(())
    }
}

impl<F: Write + Seek> Drop for MovieRecorder<F> {
    fn drop(&mut self) {
        if self.f.is_some() {
            if let Err(e) = self.finish() {
                tracing::error!("closing movie recording: {e}");
            }
        }
    }
}

fn write_header<F: Write + Seek>(f: &mut F, width: u32, height: u32) -> Result<Header> {
    let row_bytes = width as usize * 3;
    let chunk_size = row_bytes * height as usize + 8;

    f.write_u32::<LittleEndian>(FMF_VERSION)?;
    f.write_u32::<LittleEndian>(FORMAT.len() as u32)?;
    f.write_all(FORMAT)?;
    f.write_u32::<LittleEndian>(BITS_PER_PIXEL)?;
    f.write_u32::<LittleEndian>(height)?;
    f.write_u32::<LittleEndian>(width)?;
    f.write_u64::<LittleEndian>(chunk_size as u64)?;
    let n_frames_pos = (4 + 4 + FORMAT.len() + 4 + 4 + 4 + 8) as u64;
    f.write_u64::<LittleEndian>(0)?;

    Ok(Header {
        width,
        height,
        n_frames_pos,
    })
}
