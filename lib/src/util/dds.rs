use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use ddsfile::{Caps2, D3DFormat, Dds, FourCC, NewD3dParams, PixelFormat};

use crate::{
    error::XfbinError,
    format::nut::{ENutPixelFormat, NutTexture, K_NUT_CUBEMAP},
};

const K_FOURCC_ATI1: u32 = u32::from_le_bytes(*b"ATI1");
const K_FOURCC_ATI2: u32 = u32::from_le_bytes(*b"ATI2");
/// Smallest mip a block-compressed NUT texture stores.
const K_MIN_NUT_MIP_SIZE: usize = 16;

fn to_d3d_format(format: ENutPixelFormat) -> D3DFormat {
    match format {
        ENutPixelFormat::Dxt1 | ENutPixelFormat::Ati1 => D3DFormat::DXT1,
        ENutPixelFormat::Dxt3 => D3DFormat::DXT3,
        ENutPixelFormat::Dxt5 | ENutPixelFormat::Ati2 => D3DFormat::DXT5,
        ENutPixelFormat::A1R5G5B5 => D3DFormat::A1R5G5B5,
        ENutPixelFormat::A4R4G4B4 => D3DFormat::A4R4G4B4,
        ENutPixelFormat::R5G6B5 => D3DFormat::R5G6B5,
        ENutPixelFormat::A8B8G8R8 => D3DFormat::A8B8G8R8,
        ENutPixelFormat::A8R8G8B8 => D3DFormat::A8R8G8B8,
    }
}

fn from_dds_pixel_format(spf: &PixelFormat) -> Result<ENutPixelFormat> {
    if let Some(FourCC(code)) = spf.fourcc {
        return match &code.to_le_bytes() {
            b"DXT1" => Ok(ENutPixelFormat::Dxt1),
            b"DXT3" => Ok(ENutPixelFormat::Dxt3),
            b"DXT5" => Ok(ENutPixelFormat::Dxt5),
            b"ATI1" | b"BC4U" => Ok(ENutPixelFormat::Ati1),
            b"ATI2" | b"BC5U" => Ok(ENutPixelFormat::Ati2),
            other => Err(XfbinError::unsupported(
                "DDS FourCC",
                other.iter().map(|&c| c as char).collect::<String>(),
            )
            .into()),
        };
    }
    let masks = (
        spf.rgb_bit_count.unwrap_or(0),
        spf.r_bit_mask.unwrap_or(0),
        spf.g_bit_mask.unwrap_or(0),
        spf.b_bit_mask.unwrap_or(0),
        spf.a_bit_mask.unwrap_or(0),
    );
    match masks {
        (16, 0x7C00, 0x03E0, 0x001F, 0x8000) => Ok(ENutPixelFormat::A1R5G5B5),
        (16, 0x0F00, 0x00F0, 0x000F, 0xF000) => Ok(ENutPixelFormat::A4R4G4B4),
        (16, 0xF800, 0x07E0, 0x001F, 0) => Ok(ENutPixelFormat::R5G6B5),
        (32, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000) => Ok(ENutPixelFormat::A8B8G8R8),
        (32, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000) => Ok(ENutPixelFormat::A8R8G8B8),
        (bits, r, g, b, a) => Err(XfbinError::unsupported(
            "DDS pixel format",
            format!("{bits} bits, masks {r:#x}/{g:#x}/{b:#x}/{a:#x}"),
        )
        .into()),
    }
}

/// Reverses the byte order of every packed pixel word.
pub fn swap_pixel_words(data: &mut [u8], pixel_size: usize) {
    if pixel_size > 1 {
        for word in data.chunks_exact_mut(pixel_size) {
            word.reverse();
        }
    }
}

/// Converts a NUT texture to a DDS surface. Block-compressed mips are cut to their DDS size,
/// packed pixels are byte swapped.
pub fn nut_to_dds(texture: &NutTexture) -> Result<Dds> {
    let format = texture.pixel_format;
    let mip_count = texture.mipmap_sizes.len() as u32;
    let mut dds = Dds::new_d3d(NewD3dParams {
        height: texture.height as u32,
        width: texture.width as u32,
        depth: None,
        format: to_d3d_format(format),
        mipmap_levels: Some(mip_count),
        caps2: texture
            .is_cube_map()
            .then(|| Caps2::from_bits_truncate(texture.cubemap_format | K_NUT_CUBEMAP)),
    })
    .context("Failed to create DDS header")?;
    match format {
        ENutPixelFormat::Ati1 => dds.header.spf.fourcc = Some(FourCC(K_FOURCC_ATI1)),
        ENutPixelFormat::Ati2 => dds.header.spf.fourcc = Some(FourCC(K_FOURCC_ATI2)),
        _ => {}
    }

    let mut data = Vec::with_capacity(texture.data.len());
    for face in 0..texture.face_count() {
        for (level, mip) in texture.mips(face).enumerate() {
            if let Some(pixel_size) = format.pixel_size() {
                let start = data.len();
                data.extend_from_slice(mip);
                swap_pixel_words(&mut data[start..], pixel_size);
            } else {
                let size =
                    format.mip_size(texture.width as u32, texture.height as u32, level as u32);
                data.extend_from_slice(&mip[..size.min(mip.len())]);
            }
        }
    }
    dds.data = data;
    Ok(dds)
}

pub fn write_dds<W: Write>(w: &mut W, texture: &NutTexture) -> Result<()> {
    let dds = nut_to_dds(texture)?;
    dds.write(w)?;
    Ok(())
}

/// Converts a DDS surface to a NUT texture. Block-compressed mips below 16 bytes are zero padded,
/// packed pixels are byte swapped.
pub fn dds_to_nut(dds: &Dds) -> Result<NutTexture> {
    let format = from_dds_pixel_format(&dds.header.spf)?;
    let size = (u16::try_from(dds.header.width), u16::try_from(dds.header.height));
    let (width, height) = match size {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(XfbinError::Value(format!(
                "texture size {}x{} too large",
                dds.header.width, dds.header.height
            ))
            .into())
        }
    };
    let mip_count = dds.header.mip_map_count.unwrap_or(1).max(1);
    let caps2 = dds.header.caps2.bits();
    let cubemap_format = if caps2 & K_NUT_CUBEMAP != 0 { caps2 & 0xFE00 } else { 0 };
    let faces = if cubemap_format != 0 { 6 } else { 1 };

    let mut mipmap_sizes = Vec::with_capacity(mip_count as usize);
    let mut data = Vec::with_capacity(dds.data.len());
    let mut pos = 0usize;
    for face in 0..faces {
        for level in 0..mip_count {
            let size = format.mip_size(width as u32, height as u32, level);
            let mip = dds.data.get(pos..pos + size).ok_or_else(|| {
                XfbinError::malformed(
                    "DDS data",
                    pos as u64,
                    format!("face {face} mip {level} needs {size:#x} bytes"),
                )
            })?;
            pos += size;
            let start = data.len();
            data.extend_from_slice(mip);
            if let Some(pixel_size) = format.pixel_size() {
                swap_pixel_words(&mut data[start..], pixel_size);
            } else if size < K_MIN_NUT_MIP_SIZE {
                data.resize(start + K_MIN_NUT_MIP_SIZE, 0);
            }
            if face == 0 {
                mipmap_sizes.push((data.len() - start) as u32);
            }
        }
    }
    if pos != dds.data.len() {
        log::warn!("Ignoring {:#x} trailing bytes of DDS data", dds.data.len() - pos);
    }
    Ok(NutTexture {
        pixel_format: format,
        width,
        height,
        cubemap_format,
        hash_id: 0,
        mipmap_count: mipmap_sizes.len() as u8,
        mipmap_sizes,
        data,
    })
}

pub fn read_dds(data: &[u8]) -> Result<NutTexture> {
    let dds = Dds::read(&mut Cursor::new(data)).context("Failed to parse DDS")?;
    dds_to_nut(&dds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_kind, ErrorKind};

    fn texture(format: ENutPixelFormat, width: u16, height: u16, data: Vec<u8>) -> NutTexture {
        NutTexture {
            pixel_format: format,
            width,
            height,
            cubemap_format: 0,
            hash_id: 0,
            mipmap_count: 1,
            mipmap_sizes: vec![data.len() as u32],
            data,
        }
    }

    #[test]
    fn dxt1_round_trip() {
        let mut block = vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        // NUT stores the 8-byte block padded to 16 bytes
        block.resize(16, 0);
        let nut = texture(ENutPixelFormat::Dxt1, 4, 4, block.clone());

        let dds = nut_to_dds(&nut).unwrap();
        assert_eq!(dds.header.spf.fourcc, Some(FourCC(u32::from_le_bytes(*b"DXT1"))));
        assert_eq!(dds.data, &block[..8]);

        let mut file = Vec::new();
        dds.write(&mut file).unwrap();
        assert_eq!(&file[..4], b"DDS ");
        let back = read_dds(&file).unwrap();
        assert_eq!(back.pixel_format, ENutPixelFormat::Dxt1);
        assert_eq!((back.width, back.height), (4, 4));
        assert_eq!(back.data, block);
        assert_eq!(back.mipmap_sizes, vec![16]);
    }

    #[test]
    fn r5g6b5_is_swapped_both_ways() {
        // 2x1 pixels stored big-endian in the NUT
        let nut = texture(ENutPixelFormat::R5G6B5, 2, 1, vec![0xF8, 0x00, 0x07, 0xE0]);
        let dds = nut_to_dds(&nut).unwrap();
        assert_eq!(dds.header.spf.rgb_bit_count, Some(16));
        assert_eq!(dds.header.spf.r_bit_mask, Some(0xF800));
        assert_eq!(dds.data, vec![0x00, 0xF8, 0xE0, 0x07]);

        let mut file = Vec::new();
        dds.write(&mut file).unwrap();
        let back = read_dds(&file).unwrap();
        assert_eq!(back.pixel_format, ENutPixelFormat::R5G6B5);
        assert_eq!(back.data, nut.data);
    }

    #[test]
    fn ati2_keeps_its_fourcc() {
        let nut = texture(ENutPixelFormat::Ati2, 4, 4, vec![0xAB; 16]);
        let dds = nut_to_dds(&nut).unwrap();
        assert_eq!(dds.header.spf.fourcc, Some(FourCC(K_FOURCC_ATI2)));
        let mut file = Vec::new();
        dds.write(&mut file).unwrap();
        assert_eq!(read_dds(&file).unwrap().pixel_format, ENutPixelFormat::Ati2);
    }

    #[test]
    fn mip_chain() {
        // 8x8 DXT5: 64, 16 and 16 bytes
        let mut nut = texture(ENutPixelFormat::Dxt5, 8, 8, (0..96).map(|i| i as u8).collect());
        nut.mipmap_sizes = vec![64, 16, 16];
        let dds = nut_to_dds(&nut).unwrap();
        assert_eq!(dds.header.mip_map_count, Some(3));
        assert_eq!(dds.data, nut.data);
        assert_eq!(dds_to_nut(&dds).unwrap().mipmap_sizes, vec![64, 16, 16]);
    }

    #[test]
    fn unsupported_fourcc() {
        let nut = texture(ENutPixelFormat::Dxt1, 4, 4, vec![0; 16]);
        let mut dds = nut_to_dds(&nut).unwrap();
        dds.header.spf.fourcc = Some(FourCC(u32::from_le_bytes(*b"BC7X")));
        let err = dds_to_nut(&dds).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::UnsupportedFormat));
    }

    #[test]
    fn truncated_surface() {
        let nut = texture(ENutPixelFormat::A8R8G8B8, 2, 2, vec![0; 16]);
        let mut dds = nut_to_dds(&nut).unwrap();
        dds.data.truncate(12);
        let err = dds_to_nut(&dds).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Structural));
    }
}
