mod common;

use std::fs;

use common::{build_elf, TempDir, TestSection};
use compiler::elf::{extract_flat_binary, parse_elf_from_bytes};
use compiler::BuildError;

#[test]
fn flat_image_lays_out_sections_by_address() {
    let text = [0x13, 0x05, 0x10, 0x00, 0x67, 0x80, 0x00, 0x00]; // li a0,1; ret
    let data = [0xaa, 0xbb];
    let image = build_elf(
        0,
        &[
            TestSection::text(0x0, &text),
            TestSection::data(0x10, &data),
            TestSection::bss(0x20, 0x100),
            TestSection::comment(b"GCC: (GNU) 13.2.0\0"),
        ],
    );

    let elf = parse_elf_from_bytes(&image).unwrap();
    assert_eq!(elf.entry, 0);
    assert_eq!(elf.loadable_sections().count(), 2);
    assert_eq!(elf.loadable_size(), 10);

    let (flat, base) = elf.flat_image().unwrap();
    assert_eq!(base, 0);
    assert_eq!(flat.len(), 0x12);
    assert_eq!(&flat[..8], &text);
    assert!(flat[8..0x10].iter().all(|b| *b == 0));
    assert_eq!(&flat[0x10..], &data);
}

#[test]
fn flat_image_is_relative_to_lowest_section() {
    let image = build_elf(
        0x8000_0000,
        &[
            TestSection::data(0x8000_0004, &[2, 2]),
            TestSection::text(0x8000_0000, &[1, 1, 1, 1]),
        ],
    );
    let elf = parse_elf_from_bytes(&image).unwrap();
    let (flat, base) = elf.flat_image().unwrap();
    assert_eq!(base, 0x8000_0000);
    assert_eq!(flat, [1, 1, 1, 1, 2, 2]);
}

#[test]
fn extraction_writes_headerless_bytes() {
    let dir = TempDir::new("extract");
    let image = dir.write(
        "hello",
        &build_elf(0, &[TestSection::text(0, &[0x93, 0x00, 0x50, 0x00])]),
    );
    let output = dir.path().join("hello.bin");

    let size = extract_flat_binary(&image, &output).unwrap();
    assert_eq!(size, 4);
    assert_eq!(fs::read(&output).unwrap(), [0x93, 0x00, 0x50, 0x00]);
}

#[test]
fn nothing_loadable_writes_nothing() {
    let dir = TempDir::new("extract-empty");
    let image = dir.write(
        "empty",
        &build_elf(0, &[TestSection::bss(0, 64), TestSection::comment(b"x\0")]),
    );
    let output = dir.path().join("empty.bin");

    let err = extract_flat_binary(&image, &output).unwrap_err();
    assert!(matches!(err, BuildError::Extract { .. }));
    assert!(!output.exists());
}

#[test]
fn garbage_is_not_an_image() {
    let dir = TempDir::new("extract-garbage");
    let image = dir.write("garbage", b"this is not an ELF file at all, not even close");
    let output = dir.path().join("garbage.bin");

    let err = extract_flat_binary(&image, &output).unwrap_err();
    assert!(matches!(err, BuildError::Elf { .. }));
    assert!(!output.exists());
}

#[test]
fn missing_image_is_an_io_error() {
    let dir = TempDir::new("extract-missing");
    let err = extract_flat_binary(&dir.path().join("nope"), &dir.path().join("nope.bin"))
        .unwrap_err();
    assert!(matches!(err, BuildError::Io { .. }));
}
