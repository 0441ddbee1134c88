//! Gadget-2/3 block-format snapshot writer.
//!
//! Layout per block: a little-endian `u32` byte count, the payload, and
//! the count again. The header occupies 256 bytes; positions and
//! velocities are written as interleaved single-precision triples, ids as
//! 64-bit integers. Every header value is driven by the configured
//! cosmology.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gaussic_core::{CosmologicalParameters, ParticleSet, Real};

use crate::error::Result;

const HEADER_BYTES: usize = 256;

struct HeaderWriter {
    buffer: Vec<u8>,
}

impl HeaderWriter {
    fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(HEADER_BYTES),
        }
    }

    fn i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn finish(mut self) -> Vec<u8> {
        assert!(self.buffer.len() <= HEADER_BYTES, "header overflow");
        self.buffer.resize(HEADER_BYTES, 0);
        self.buffer
    }
}

fn build_header<T: Real>(
    particles: &ParticleSet<T>,
    cosmology: &CosmologicalParameters<T>,
    boxsize: T,
    format: u8,
) -> Vec<u8> {
    let count = particles.len() as u64;
    let mut header = HeaderWriter::new();

    // npart: all particles are type 1 (dark matter)
    for kind in 0..6 {
        header.i32(if kind == 1 { count as i32 } else { 0 });
    }
    for kind in 0..6 {
        header.f64(if kind == 1 {
            particles.mass.as_f64()
        } else {
            0.0
        });
    }
    header.f64(cosmology.scalefactor.as_f64());
    header.f64(cosmology.redshift.as_f64());
    header.i32(0); // flag_sfr
    header.i32(0); // flag_feedback
    for kind in 0..6 {
        header.u32(if kind == 1 { count as u32 } else { 0 });
    }
    header.i32(0); // flag_cooling
    header.i32(1); // num_files
    header.f64(boxsize.as_f64());
    header.f64(cosmology.omega_m0.as_f64());
    header.f64(cosmology.omega_lambda0.as_f64());
    header.f64(cosmology.hubble.as_f64());

    if format >= 3 {
        header.i32(0); // flag_stellarage
        header.i32(0); // flag_metals
        for kind in 0..6 {
            header.u32(if kind == 1 { (count >> 32) as u32 } else { 0 });
        }
        header.i32(0); // flag_entropy_instead_u
        header.i32(0); // flag_doubleprecision
        header.i32(1); // flag_ic_info: Zel'dovich
    }

    header.finish()
}

fn write_block<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    let size = payload.len() as u32;
    writer.write_all(&size.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&size.to_le_bytes())
}

/// Write a Gadget snapshot (`format` 2 or 3) from the particle arrays.
pub fn save_gadget<T: Real>(
    path: &Path,
    particles: &ParticleSet<T>,
    cosmology: &CosmologicalParameters<T>,
    boxsize: T,
    format: u8,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let count = particles.len();

    write_block(
        &mut writer,
        &build_header(particles, cosmology, boxsize, format),
    )?;

    let mut triples = Vec::with_capacity(count * 12);
    for i in 0..count {
        for axis in 0..3 {
            triples.extend_from_slice(&(particles.position[axis][i].as_f64() as f32).to_le_bytes());
        }
    }
    write_block(&mut writer, &triples)?;

    triples.clear();
    for i in 0..count {
        for axis in 0..3 {
            triples.extend_from_slice(&(particles.velocity[axis][i].as_f64() as f32).to_le_bytes());
        }
    }
    write_block(&mut writer, &triples)?;

    let mut ids = Vec::with_capacity(count * 8);
    for &id in &particles.ids {
        ids.extend_from_slice(&(id as i64).to_le_bytes());
    }
    write_block(&mut writer, &ids)?;

    tracing::info!(
        file = %path.display(),
        particles = count,
        format,
        "wrote snapshot"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particles(count: usize) -> ParticleSet<f64> {
        ParticleSet {
            position: [
                (0..count).map(|i| i as f64).collect(),
                vec![1.0; count],
                vec![2.0; count],
            ],
            velocity: [vec![0.5; count], vec![-0.5; count], vec![0.0; count]],
            ids: (0..count as u64).collect(),
            mass: 3.5,
        }
    }

    #[test]
    fn test_header_is_exactly_256_bytes() {
        let cosmology = CosmologicalParameters::<f64>::new();
        let header = build_header(&particles(8), &cosmology, 100.0, 2);
        assert_eq!(header.len(), HEADER_BYTES);
        let header3 = build_header(&particles(8), &cosmology, 100.0, 3);
        assert_eq!(header3.len(), HEADER_BYTES);
    }

    #[test]
    fn test_block_sizes_bracket_payloads() {
        let cosmology = CosmologicalParameters::<f64>::new();
        let mut path = std::env::temp_dir();
        path.push(format!("gaussic-snapshot-test-{}", std::process::id()));
        let set = particles(4);
        save_gadget(&path, &set, &cosmology, 100.0, 2).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // header block
        let header_size = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        assert_eq!(header_size, HEADER_BYTES);
        let trailer =
            u32::from_le_bytes(bytes[4 + header_size..8 + header_size].try_into().unwrap());
        assert_eq!(trailer as usize, HEADER_BYTES);
        // position block: 4 particles * 3 components * 4 bytes
        let pos_offset = 8 + header_size;
        let pos_size =
            u32::from_le_bytes(bytes[pos_offset..pos_offset + 4].try_into().unwrap()) as usize;
        assert_eq!(pos_size, 4 * 12);
        std::fs::remove_file(&path).unwrap();
    }
}
