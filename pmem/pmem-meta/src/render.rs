//! YAML rendering of the layout document.
//!
//! The field set and ordering are part of the consumer-facing contract;
//! acquisition tools parse this document to drive their reads of
//! `/dev/pmem`.

use alloc::string::String;
use core::fmt::{self, Write};

use crate::{LayoutRegisters, MemRange};

pub(crate) fn render_document(
    registers: &LayoutRegisters,
    ranges: &[MemRange],
) -> Result<String, fmt::Error> {
    let mut doc = String::new();
    write!(
        doc,
        "%YAML 1.2\n\
         ---\n\
         meta:\n\
         \x20 pmem_api_version: {api}\n\
         \x20 cr3: {cr3}\n\
         \x20 dtb_off: {dtb}\n\
         \x20 phys_mem_size: {phys}\n\
         \x20 pci_config_space_base: {pci}\n\
         \x20 mmap_poffset: {mmap_poff}\n\
         \x20 mmap_desc_version: {mmap_ver}\n\
         \x20 mmap_size: {mmap_size}\n\
         \x20 mmap_desc_size: {mmap_desc}\n\
         \x20 kaslr_slide: {kaslr}\n\
         \x20 kernel_poffset: {kern_poff}\n\
         \x20 kernel_version: \"{kern_ver}\"\n\
         memory_ranges:\n",
        api = registers.api_version,
        cr3 = registers.cr3,
        dtb = registers.dtb_offset,
        phys = registers.phys_mem_size,
        pci = registers.pci_config_space_base,
        mmap_poff = registers.mmap_phys_offset,
        mmap_ver = registers.mmap_desc_version,
        mmap_size = registers.mmap_size,
        mmap_desc = registers.mmap_desc_size,
        kaslr = registers.kaslr_slide,
        kern_poff = registers.kernel_phys_offset,
        kern_ver = registers.kernel_version,
    )?;

    for range in ranges {
        write!(
            doc,
            "\x20 - purpose: \"{purpose}\"\n\
             \x20   hardware_informant: {hardware}\n\
             \x20   start: {start}\n\
             \x20   length: {length}\n\
             \x20   type: \"{kind}\"\n\
             \x20   subtype: \"{subtype}\"\n",
            purpose = range.purpose,
            hardware = range.hardware,
            start = range.start,
            length = range.length,
            kind = range.kind.type_str(),
            subtype = range.subtype,
        )?;
    }

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::borrow::ToOwned;
    use crate::RangeKind;

    #[test]
    fn empty_range_list_still_renders_the_header() {
        let doc = render_document(&LayoutRegisters::default(), &[]).unwrap();
        assert!(doc.starts_with("%YAML 1.2\n---\n"));
        assert!(doc.ends_with("memory_ranges:\n"));
    }

    #[test]
    fn ranges_render_in_order() {
        let ranges = [
            MemRange {
                purpose: "a".to_owned(),
                hardware: false,
                start: 0,
                length: 4096,
                kind: RangeKind::Efi,
                subtype: "EfiLoaderData".to_owned(),
            },
            MemRange {
                purpose: "b".to_owned(),
                hardware: true,
                start: 4096,
                length: 4096,
                kind: RangeKind::Reserved,
                subtype: "hole".to_owned(),
            },
        ];
        let doc = render_document(&LayoutRegisters::default(), &ranges).unwrap();
        let a = doc.find("purpose: \"a\"").unwrap();
        let b = doc.find("purpose: \"b\"").unwrap();
        assert!(a < b);
        assert!(doc.contains("type: \"reserved_range\""));
    }
}
