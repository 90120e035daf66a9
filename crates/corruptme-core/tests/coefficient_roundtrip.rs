mod common;

use std::fs;

use corruptme_core::jpeg::{parse_jpeg, Segment};
use corruptme_core::JpegSession;
use jpeg_encoder::SamplingFactor;
use tempfile::TempDir;

use common::{decode_pixels, init_logger, Fixture};

/// Every block of every component, component by component in raster order.
fn all_blocks(session: &JpegSession) -> Vec<[i16; 64]> {
    let mut blocks = Vec::new();
    for component in 0..session.num_components().unwrap() {
        for by in 0..session.num_blocks_y(component).unwrap() {
            for bx in 0..session.num_blocks_x(component).unwrap() {
                blocks.push(session.get_block(component, bx, by).unwrap());
            }
        }
    }
    blocks
}

fn non_scan_segments(data: &[u8]) -> Vec<Segment> {
    parse_jpeg(data, true)
        .unwrap()
        .segments
        .into_iter()
        .filter(|segment| matches!(segment, Segment::Raw { .. }))
        .collect()
}

fn assert_unedited_round_trip(fixture: Fixture) {
    let dir = TempDir::new().unwrap();
    let path = fixture.write_to(dir.path(), "in.jpg");
    let out = dir.path().join("out.jpg");

    let mut session = JpegSession::open(&path).unwrap();
    let before = all_blocks(&session);
    let (width, height) = session.dimensions().unwrap();
    session.close(Some(out.as_path())).unwrap();

    let reopened = JpegSession::open(&out).unwrap();
    assert_eq!(reopened.dimensions().unwrap(), (width, height));
    assert_eq!(all_blocks(&reopened), before);
    assert_eq!(
        non_scan_segments(&fs::read(&path).unwrap()),
        non_scan_segments(&fs::read(&out).unwrap())
    );
}

#[test]
fn unedited_gray_round_trip() {
    init_logger();
    assert_unedited_round_trip(Fixture::gray(64, 64));
}

#[test]
fn unedited_partial_mcu_round_trip() {
    assert_unedited_round_trip(Fixture::gray(33, 17));
    assert_unedited_round_trip(Fixture::color(37, 21, SamplingFactor::F_2_2));
}

#[test]
fn unedited_interleaved_color_round_trip() {
    for sampling in [SamplingFactor::F_1_1, SamplingFactor::F_2_1, SamplingFactor::F_2_2] {
        assert_unedited_round_trip(Fixture::color(48, 32, sampling));
    }
}

#[test]
fn unedited_multi_scan_round_trip() {
    assert_unedited_round_trip(Fixture::gray(40, 40).with_optimized_tables());
    assert_unedited_round_trip(
        Fixture::color(32, 32, SamplingFactor::F_2_2).with_optimized_tables(),
    );
}

#[test]
fn unedited_restart_interval_round_trip() {
    assert_unedited_round_trip(Fixture::gray(64, 48).with_restart_interval(3));
    assert_unedited_round_trip(
        Fixture::color(64, 48, SamplingFactor::F_2_2).with_restart_interval(1),
    );
}

#[test]
fn restart_interval_survives_edits() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = Fixture::color(64, 64, SamplingFactor::F_2_2)
        .with_restart_interval(2)
        .write_to(dir.path(), "rst.jpg");
    let out = dir.path().join("rst-out.jpg");

    let mut session = JpegSession::open(&path).unwrap();
    let mut expected = Vec::new();
    for component in 0..3 {
        let (bx, by) = (component + 1, 1);
        let mut block = session.get_block(component, bx, by).unwrap();
        block[0] = block[0].wrapping_neg();
        block[2] += 5;
        session.set_block(component, bx, by, &block).unwrap();
        expected.push((component, bx, by, block));
    }
    let edited = all_blocks(&session);
    session.close(Some(out.as_path())).unwrap();

    let reopened = JpegSession::open(&out).unwrap();
    assert_eq!(all_blocks(&reopened), edited);
    for (component, bx, by, block) in expected {
        assert_eq!(reopened.get_block(component, bx, by).unwrap(), block);
    }
    decode_pixels(&fs::read(&out).unwrap());
}

#[test]
fn heavily_edited_file_decodes_elsewhere() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::color(48, 48, SamplingFactor::F_2_1).write_to(dir.path(), "in.jpg");
    let out = dir.path().join("glitched.jpg");

    let mut session = JpegSession::open(&path).unwrap();
    let mut seed = 0x2545_F491u32;
    for component in 0..session.num_components().unwrap() {
        for by in 0..session.num_blocks_y(component).unwrap() {
            for bx in 0..session.num_blocks_x(component).unwrap() {
                let mut block = session.get_block(component, bx, by).unwrap();
                for value in block.iter_mut().skip(1) {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    if seed % 7 == 0 {
                        *value = (seed % 61) as i16 - 30;
                    }
                }
                session.set_block(component, bx, by, &block).unwrap();
            }
        }
    }
    let edited = all_blocks(&session);
    session.close(Some(out.as_path())).unwrap();

    let (width, height, pixels) = decode_pixels(&fs::read(&out).unwrap());
    assert_eq!((width, height), (48, 48));
    assert_eq!(pixels.len(), 48 * 48 * 3);
    assert_eq!(all_blocks(&JpegSession::open(&out).unwrap()), edited);
}

#[test]
fn edited_output_differs_in_pixels() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::gray(64, 64).write_to(dir.path(), "in.jpg");
    let out = dir.path().join("out.jpg");

    JpegSession::edit(&path, Some(out.as_path()), |session| {
        let mut block = session.get_block(0, 0, 0)?;
        block[0] += 50;
        session.set_block(0, 0, 0, &block)
    })
    .unwrap();

    let (_, _, original) = decode_pixels(&fs::read(&path).unwrap());
    let (_, _, edited) = decode_pixels(&fs::read(&out).unwrap());
    // only the first 8x8 block changes
    let changed: Vec<usize> = original
        .iter()
        .zip(&edited)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    assert!(!changed.is_empty());
    assert!(changed.iter().all(|&i| i % 64 < 8 && i / 64 < 8));
}

#[test]
fn extreme_encodable_values_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::gray(16, 16).write_to(dir.path(), "in.jpg");
    let out = dir.path().join("out.jpg");

    let mut block = [0i16; 64];
    // largest magnitudes the standard tables can code: DC category 11, AC category 10
    block[0] = 2047;
    block[1] = -1023;
    block[8] = 1023;
    block[63] = -1;
    let neighbour = [0i16; 64];

    // predecessor in scan order has DC 0 so the DC difference stays at 2047
    let mut session = JpegSession::open(&path).unwrap();
    session.set_block(0, 0, 0, &neighbour).unwrap();
    session.set_block(0, 1, 0, &block).unwrap();
    session.set_block(0, 0, 1, &neighbour).unwrap();
    session.close(Some(out.as_path())).unwrap();

    let reopened = JpegSession::open(&out).unwrap();
    assert_eq!(reopened.get_block(0, 1, 0).unwrap(), block);
    assert_eq!(reopened.get_block(0, 0, 1).unwrap(), neighbour);
}

#[test]
fn writing_to_source_replaces_file_in_place() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::gray(32, 32).write_to(dir.path(), "in.jpg");

    let mut session = JpegSession::open(&path).unwrap();
    session.set_block(0, 0, 0, &[0; 64]).unwrap();
    let expected = session.to_jpeg_bytes().unwrap();
    session.close(Some(path.as_path())).unwrap();

    assert_eq!(fs::read(&path).unwrap(), expected);
}
