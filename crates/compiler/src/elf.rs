use std::fs;
use std::path::Path;

use goblin::elf::section_header::{SHF_ALLOC, SHT_NOBITS};
use goblin::elf::Elf;

use crate::error::BuildError;

pub struct ElfInfo<'a> {
    pub entry: u64,
    pub sections: Vec<ElfSection<'a>>,
}

pub struct ElfSection<'a> {
    pub name: String,
    pub addr: u64,
    pub size: u64,
    pub flags: u64,
    pub kind: u32,
    pub data: &'a [u8],
}

impl ElfSection<'_> {
    /// Occupies memory at run time and carries bytes in the file.
    pub fn is_loadable(&self) -> bool {
        self.flags & u64::from(SHF_ALLOC) != 0 && self.kind != SHT_NOBITS && self.size > 0
    }
}

impl<'a> ElfInfo<'a> {
    /// Returns a reference to a section by its name, if it exists.
    /// Only the first section with the given name is returned, or None if not found.
    pub fn get_section_by_name(&self, name: &str) -> Option<&ElfSection<'a>> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn loadable_sections(&self) -> impl Iterator<Item = &ElfSection<'a>> {
        self.sections.iter().filter(|s| s.is_loadable())
    }

    /// Sum of the sizes of every loadable section.
    pub fn loadable_size(&self) -> u64 {
        self.loadable_sections().map(|s| s.size).sum()
    }

    /// Lays every loadable section out at its address relative to the lowest
    /// one, zero-filling the gaps. Returns the buffer and its base address,
    /// or None when nothing in the image is loadable.
    pub fn flat_image(&self) -> Option<(Vec<u8>, u64)> {
        let base = self.loadable_sections().map(|s| s.addr).min()?;
        let end = self.loadable_sections().map(|s| s.addr + s.size).max()?;

        let mut flat = vec![0u8; (end - base) as usize];
        for section in self.loadable_sections() {
            let offset = (section.addr - base) as usize;
            flat[offset..offset + section.data.len()].copy_from_slice(section.data);
        }

        Some((flat, base))
    }
}

pub fn parse_elf_from_bytes<'a>(bytes: &'a [u8]) -> Result<ElfInfo<'a>, goblin::error::Error> {
    let elf = Elf::parse(bytes)?;

    let mut sections = Vec::new();
    for section in elf.section_headers.iter() {
        if let Some(name) = elf.shdr_strtab.get_at(section.sh_name) {
            let offset = section.sh_offset as usize;
            let size = section.sh_size as usize;

            let is_nobits = section.sh_type == SHT_NOBITS;
            if offset + size <= bytes.len() || is_nobits {
                let data = if is_nobits {
                    &bytes[0..0]
                } else {
                    &bytes[offset..offset + size]
                };
                sections.push(ElfSection {
                    name: name.to_string(),
                    addr: section.sh_addr,
                    size: section.sh_size,
                    flags: section.sh_flags,
                    kind: section.sh_type,
                    data,
                });
            }
        }
    }

    Ok(ElfInfo {
        entry: elf.entry,
        sections,
    })
}

/// Native `objcopy -O binary`: writes the loadable bytes of `image` to
/// `output` and returns the number of bytes written.
///
/// Nothing is written when the image has no loadable content.
pub fn extract_flat_binary(image: &Path, output: &Path) -> Result<u64, BuildError> {
    let bytes = fs::read(image).map_err(|e| BuildError::io(image, e))?;
    let elf = parse_elf_from_bytes(&bytes).map_err(|source| BuildError::Elf {
        image: image.to_path_buf(),
        source,
    })?;

    let (flat, base) = elf.flat_image().ok_or_else(|| BuildError::Extract {
        image: image.to_path_buf(),
        reason: "no loadable sections".to_string(),
    })?;

    log::debug!(
        "{}: {} loadable bytes at 0x{:x}, entry 0x{:x}",
        image.display(),
        flat.len(),
        base,
        elf.entry
    );

    if let Err(e) = fs::write(output, &flat) {
        let _ = fs::remove_file(output);
        return Err(BuildError::io(output, e));
    }
    Ok(flat.len() as u64)
}
