use super::{
    BaselineCache, CommonFrameBaseline, FrameRecord, FrameRegion, FrameWorkingSet, Instruction,
};
use crate::dwarf::cursor::{Cursor, Endian};
use crate::dwarf::tests::SIMPLE_FRAME;
use crate::error::{Error, ErrorKind};

fn region(data: &[u8]) -> FrameRegion<'_> {
    FrameRegion::new(data, Endian::Little)
}

#[test]
fn parse_simple_cie() {
    let baseline = region(&SIMPLE_FRAME).parse_cie(0).unwrap();

    assert_eq!(
        baseline,
        CommonFrameBaseline {
            code_alignment_factor: 1,
            data_alignment_factor: -8,
            return_address_register: 16,
            cfa_register: 7,
            cfa_offset: 8,
            return_address_offset: Some(-8),
        }
    );
}

#[test]
fn records_in_order() {
    let records = region(&SIMPLE_FRAME)
        .records()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(
        records,
        [
            FrameRecord::Cie { offset: 0 },
            FrameRecord::Fde(FrameWorkingSet {
                offset: 0x14,
                cie_offset: 0,
                initial_location: 0x2000,
                address_range: 0x100,
                instructions: &[0x63, 0x13, 2],
                endian: Endian::Little,
            }),
        ]
    );
}

#[test]
fn fde_range_is_half_open() {
    let region = region(&SIMPLE_FRAME);
    assert_eq!(region.find_fde(0x2000, usize::MAX).unwrap().offset, 0x14);
    assert_eq!(region.find_fde(0x20ff, usize::MAX).unwrap().offset, 0x14);
    assert_eq!(
        region.find_fde(0x2100, usize::MAX),
        Err(Error::PcNotCovered(0x2100))
    );
}

#[test]
fn big_endian_records() {
    #[rustfmt::skip]
    let data = [
        0, 0, 0, 0x0d,
        0xff, 0xff, 0xff, 0xff,
        3, 0, 4, 0x7c, 8,
        0x0c, 31, 0,
        0,
        0, 0, 0, 0x14,
        0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0x10, 0,
        0, 0, 0, 0, 0, 0, 0, 0x40,
    ];
    let region = FrameRegion::new(&data, Endian::Big);
    let fde = region.find_fde(0x1010, usize::MAX).unwrap();
    assert_eq!(fde.initial_location, 0x1000);
    assert_eq!(fde.address_range, 0x40);
    assert!(fde.instructions.is_empty());

    let baseline = region.parse_cie(fde.cie_offset).unwrap();
    assert_eq!(baseline.code_alignment_factor, 4);
    assert_eq!(baseline.data_alignment_factor, -4);
    assert_eq!(baseline.cfa_register, 31);
    assert_eq!(baseline.return_address_offset, None);
}

fn cie(body: &[u8]) -> Vec<u8> {
    let mut data = (body.len() as u32 + 4).to_le_bytes().to_vec();
    data.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
    data.extend_from_slice(body);
    data
}

#[test]
fn augmentation_is_unsupported() {
    // the CIE from a Rust binary's .eh_frame, with the version bumped to 3
    #[rustfmt::skip]
    let data = cie(&[
        3,
        0x7a, 0x52, 0, 1,
        0x78, 0x10, 1,
        0x1b, 0xc, 7, 8,
        0x90, 1, 0, 0,
    ]);

    let err = region(&data).parse_cie(0).unwrap_err();
    assert_eq!(err, Error::UnsupportedAugmentation(b'z'));
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn only_version_3() {
    for version in [1, 2, 4, 5] {
        let data = cie(&[version, 0, 1, 0x78, 16]);
        assert_eq!(
            region(&data).parse_cie(0),
            Err(Error::UnsupportedVersion(version))
        );
    }
}

#[test]
fn cie_offset_pointing_at_fde() {
    assert_eq!(
        region(&SIMPLE_FRAME).parse_cie(0x14),
        Err(Error::NotACie { offset: 0x14 })
    );
}

#[test]
fn cie_offset_out_of_bounds() {
    let err = region(&SIMPLE_FRAME).parse_cie(0x1000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncated);
}

#[test]
fn dwarf64_is_rejected() {
    let data = [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0, 0, 0, 0];
    assert_eq!(
        region(&data).parse_cie(0),
        Err(Error::Dwarf64Unsupported { offset: 0 })
    );
    assert_eq!(
        region(&data).find_fde(0, usize::MAX),
        Err(Error::Dwarf64Unsupported { offset: 0 })
    );
}

#[test]
fn short_records() {
    let data = [2, 0, 0, 0, 0, 0];
    assert_eq!(
        region(&data).find_fde(0, usize::MAX),
        Err(Error::EntryTooShort {
            offset: 0,
            length: 2
        })
    );

    #[rustfmt::skip]
    let data = [
        0x0c, 0, 0, 0,
        0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ];
    assert_eq!(
        region(&data).find_fde(0, usize::MAX),
        Err(Error::FdeTooShort {
            offset: 0,
            length: 12
        })
    );
}

#[test]
fn truncated_record() {
    let data = &SIMPLE_FRAME[..SIMPLE_FRAME.len() - 1];
    let mut records = region(data).records();
    assert!(matches!(records.next(), Some(Ok(FrameRecord::Cie { .. }))));
    assert!(matches!(
        records.next(),
        Some(Err(Error::UnexpectedEof { .. }))
    ));
    assert_eq!(records.next(), None);
}

#[test]
fn initial_instructions_must_end_cleanly() {
    // DW_CFA_def_cfa: reg7 <missing offset>
    let data = cie(&[3, 0, 1, 0x78, 16, 0x0c, 7]);
    let err = region(&data).parse_cie(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncated);
}

#[test]
fn initial_instructions_are_restricted() {
    // DW_CFA_advance_loc: 1
    let data = cie(&[3, 0, 1, 0x78, 16, 0x41]);
    assert_eq!(
        region(&data).parse_cie(0),
        Err(Error::UnsupportedCfaOp(0x41))
    );

    // DW_CFA_offset: reg6 -16, but the return address column is 16
    let data = cie(&[3, 0, 1, 0x78, 16, 0x86, 2]);
    assert_eq!(
        region(&data).parse_cie(0),
        Err(Error::UnsupportedCfaOp(0x86))
    );
}

#[test]
fn return_column_outside_of_inline_registers() {
    // return address column 80 can't be encoded in DW_CFA_offset, so the
    // DW_CFA_offset for reg16 must not be taken for it
    let data = cie(&[3, 0, 1, 0x78, 80, 0x90, 1]);
    assert_eq!(
        region(&data).parse_cie(0),
        Err(Error::UnsupportedCfaOp(0x90))
    );
}

#[test]
fn decode_instructions() {
    let parse = |bytes: &[u8]| {
        let data = &mut Cursor::new(&bytes[1..], Endian::Little);
        Instruction::parse(bytes[0], data)
    };

    assert_eq!(parse(&[0x00]), Ok(Instruction::Nop));
    assert_eq!(parse(&[0x40]), Ok(Instruction::AdvanceLoc(0)));
    assert_eq!(parse(&[0x7f]), Ok(Instruction::AdvanceLoc(0x3f)));
    assert_eq!(parse(&[0x02, 0xff]), Ok(Instruction::AdvanceLoc1(-1)));
    assert_eq!(parse(&[0x03, 0x00, 0x01]), Ok(Instruction::AdvanceLoc2(0x100)));
    assert_eq!(
        parse(&[0x80, 0x7e]),
        Ok(Instruction::Offset {
            register: 0,
            factored_offset: -2
        })
    );
    assert_eq!(
        parse(&[0x0c, 0x07, 0x90, 0x01]),
        Ok(Instruction::DefCfa {
            register: 7,
            offset: 144
        })
    );
    assert_eq!(parse(&[0x13, 0x7e]), Ok(Instruction::DefCfaOffsetSf(-2)));

    // DW_CFA_restore, DW_CFA_set_loc, DW_CFA_remember_state
    for opcode in [0xc1, 0x01, 0x0a] {
        assert_eq!(parse(&[opcode]), Err(Error::UnsupportedCfaOp(opcode)));
    }
}

#[test]
fn cache_parses_once() {
    let region = region(&SIMPLE_FRAME);
    let mut cache = BaselineCache::new();
    assert!(cache.is_empty());

    let first = cache.get_or_parse(&region, 0).unwrap();
    let second = cache.get_or_parse(&region, 0).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);

    // failures are not cached
    assert!(cache.get_or_parse(&region, 0x14).is_err());
    assert_eq!(cache.len(), 1);
}
