#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use compiler::{BuildError, Stage, Toolchain};

pub const SHT_PROGBITS: u32 = 1;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_NOBITS: u32 = 8;
pub const SHF_WRITE: u64 = 0x1;
pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;

/// Scratch directory removed on drop.
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(name: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "rvbuild-test-{}-{}-{}",
            name,
            std::process::id(),
            n
        ));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("create temp dir");
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.0.join(name);
        fs::write(&path, contents).expect("write test file");
        path
    }

    /// File names currently in the directory, sorted.
    pub fn listing(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.0)
            .expect("read temp dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

pub struct TestSection {
    pub name: &'static str,
    pub kind: u32,
    pub flags: u64,
    pub addr: u64,
    pub data: Vec<u8>,
    /// Only used for NOBITS sections.
    pub size: u64,
}

impl TestSection {
    pub fn text(addr: u64, data: &[u8]) -> Self {
        Self {
            name: ".text",
            kind: SHT_PROGBITS,
            flags: SHF_ALLOC | SHF_EXECINSTR,
            addr,
            data: data.to_vec(),
            size: data.len() as u64,
        }
    }

    pub fn data(addr: u64, data: &[u8]) -> Self {
        Self {
            name: ".data",
            kind: SHT_PROGBITS,
            flags: SHF_ALLOC | SHF_WRITE,
            addr,
            data: data.to_vec(),
            size: data.len() as u64,
        }
    }

    pub fn bss(addr: u64, size: u64) -> Self {
        Self {
            name: ".bss",
            kind: SHT_NOBITS,
            flags: SHF_ALLOC | SHF_WRITE,
            addr,
            data: Vec::new(),
            size,
        }
    }

    pub fn comment(data: &[u8]) -> Self {
        Self {
            name: ".comment",
            kind: SHT_PROGBITS,
            flags: 0,
            addr: 0,
            data: data.to_vec(),
            size: data.len() as u64,
        }
    }
}

/// Minimal little-endian ELF64 RISC-V executable with the given sections
/// and no program headers.
pub fn build_elf(entry: u64, sections: &[TestSection]) -> Vec<u8> {
    const EHDR: usize = 64;
    const SHDR: usize = 64;

    // Section name string table: "\0.text\0.data\0...\0.shstrtab\0"
    let mut shstrtab = vec![0u8];
    let mut name_offsets = Vec::new();
    for section in sections {
        name_offsets.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(section.name.as_bytes());
        shstrtab.push(0);
    }
    let shstrtab_name = shstrtab.len() as u32;
    shstrtab.extend_from_slice(b".shstrtab\0");

    let mut body = Vec::new();
    let mut offsets = Vec::new();
    for section in sections {
        offsets.push((EHDR + body.len()) as u64);
        body.extend_from_slice(&section.data);
    }
    let shstrtab_offset = (EHDR + body.len()) as u64;
    body.extend_from_slice(&shstrtab);
    while (EHDR + body.len()) % 8 != 0 {
        body.push(0);
    }
    let shoff = (EHDR + body.len()) as u64;
    let shnum = sections.len() as u16 + 2;

    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out.extend_from_slice(&243u16.to_le_bytes()); // EM_RISCV
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
    out.extend_from_slice(&shoff.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR as u16).to_le_bytes());
    out.extend_from_slice(&56u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&(SHDR as u16).to_le_bytes());
    out.extend_from_slice(&shnum.to_le_bytes());
    out.extend_from_slice(&(shnum - 1).to_le_bytes()); // e_shstrndx
    assert_eq!(out.len(), EHDR);

    out.extend_from_slice(&body);

    let mut shdr = |name: u32, kind: u32, flags: u64, addr: u64, offset: u64, size: u64| {
        out.extend_from_slice(&name.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&addr.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // sh_link
        out.extend_from_slice(&0u32.to_le_bytes()); // sh_info
        out.extend_from_slice(&1u64.to_le_bytes()); // sh_addralign
        out.extend_from_slice(&0u64.to_le_bytes()); // sh_entsize
    };

    shdr(0, 0, 0, 0, 0, 0);
    for (i, section) in sections.iter().enumerate() {
        shdr(
            name_offsets[i],
            section.kind,
            section.flags,
            section.addr,
            offsets[i],
            section.size,
        );
    }
    shdr(
        shstrtab_name,
        SHT_STRTAB,
        0,
        0,
        shstrtab_offset,
        shstrtab.len() as u64,
    );

    out
}

/// Stands in for the cross toolchain: "compiles" by copying, "links" by
/// wrapping the assembly bytes in an ELF `.text` at the link address.
/// Extraction uses the real built-in extractor.
///
/// Sources containing `#error` fail to compile; assembly containing
/// `undefined_symbol` fails to link; assembly containing `bss_only` links
/// into an image with nothing loadable.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    pub calls: RefCell<Vec<(Stage, PathBuf)>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.calls.borrow().iter().filter(|(s, _)| *s == stage).count()
    }

    pub fn total(&self) -> usize {
        self.calls.borrow().len()
    }
}

fn read(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w == needle.as_bytes())
}

impl Toolchain for FakeToolchain {
    fn compile_to_assembly(&self, source: &Path, output: &Path) -> Result<(), BuildError> {
        self.calls
            .borrow_mut()
            .push((Stage::Compile, source.to_path_buf()));
        let text = read(source)?;
        if contains(&text, "#error") {
            return Err(BuildError::Compile {
                source: source.to_path_buf(),
                status: Some(1),
                diagnostics: format!("{}:1:2: error: #error\n", source.display()),
            });
        }
        fs::write(output, &text).map_err(|source| BuildError::Io {
            path: output.to_path_buf(),
            source,
        })
    }

    fn link(&self, assembly: &Path, output: &Path, link_address: u64) -> Result<(), BuildError> {
        self.calls
            .borrow_mut()
            .push((Stage::Link, assembly.to_path_buf()));
        let text = read(assembly)?;
        if contains(&text, "undefined_symbol") {
            return Err(BuildError::Link {
                input: assembly.to_path_buf(),
                status: Some(1),
                diagnostics: "undefined reference to `undefined_symbol'\n".to_string(),
            });
        }
        let image = if contains(&text, "bss_only") {
            build_elf(link_address, &[TestSection::bss(link_address, 64)])
        } else {
            build_elf(
                link_address,
                &[
                    TestSection::text(link_address, &text),
                    TestSection::comment(b"fake toolchain\0"),
                ],
            )
        };
        fs::write(output, image).map_err(|source| BuildError::Io {
            path: output.to_path_buf(),
            source,
        })
    }

    fn extract_binary(&self, image: &Path, output: &Path) -> Result<u64, BuildError> {
        self.calls
            .borrow_mut()
            .push((Stage::Extract, image.to_path_buf()));
        compiler::extract_flat_binary(image, output)
    }
}
