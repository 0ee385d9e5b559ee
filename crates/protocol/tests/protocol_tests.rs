//! Integration tests for the control header codec
//!
//! Covers direction flag handling, USB setup field placement, stream frame
//! layout and the reserved meta commands.

use protocol::{
    CONTROL_GET_LAST_COMMAND_STATUS, CONTROL_GET_VERSION, CONTROL_SPECIAL_RESID, Command,
    ControlHeader, Direction, ProtocolError, REQUEST_TYPE_VENDOR_IN, REQUEST_TYPE_VENDOR_OUT,
    ResourceId, STREAM_HEADER_LEN, build_header, decode_frame, encode_frame,
};

mod direction_flag {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn write_header_always_clears_flag(resid in any::<u8>(), cmd in any::<u8>(), len in 0usize..=255) {
            let header = build_header(ResourceId(resid), Command(cmd), Direction::Write, len).unwrap();
            prop_assert!(!header.cmd.is_read());
            prop_assert_eq!(header.cmd.operation(), cmd & 0x7f);
            prop_assert_eq!(header.usb_setup().request_type, REQUEST_TYPE_VENDOR_OUT);
        }

        #[test]
        fn read_header_always_sets_flag(resid in any::<u8>(), cmd in any::<u8>(), len in 0usize..=255) {
            let header = build_header(ResourceId(resid), Command(cmd), Direction::Read, len).unwrap();
            prop_assert!(header.cmd.is_read());
            prop_assert_eq!(header.cmd.operation(), cmd & 0x7f);
            prop_assert_eq!(header.usb_setup().request_type, REQUEST_TYPE_VENDOR_IN);
        }

        #[test]
        fn usb_setup_places_fields(resid in any::<u8>(), cmd in any::<u8>(), len in any::<u8>()) {
            let header = ControlHeader::new(ResourceId(resid), Command(cmd), len);
            let setup = header.usb_setup();
            prop_assert_eq!(setup.index, resid as u16);
            prop_assert_eq!(setup.value, cmd as u16);
            prop_assert_eq!(setup.length, len as u16);
            prop_assert_eq!(setup.request, 0);
        }

        #[test]
        fn stream_frame_is_header_then_payload(
            resid in any::<u8>(),
            cmd in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=64),
        ) {
            let header = build_header(ResourceId(resid), Command(cmd), Direction::Write, payload.len()).unwrap();
            let frame = encode_frame(&header, &payload);
            prop_assert_eq!(frame.len(), STREAM_HEADER_LEN + payload.len());
            prop_assert_eq!(&frame[..STREAM_HEADER_LEN], &header.encode_stream()[..]);
            prop_assert_eq!(&frame[STREAM_HEADER_LEN..], &payload[..]);
        }
    }

    #[test]
    fn test_flag_is_normalised_not_toggled() {
        let already_read = Command(0x85);
        assert_eq!(already_read.set_read(), Command(0x85));
        let already_write = Command(0x05);
        assert_eq!(already_write.set_write(), Command(0x05));
    }
}

mod reserved_commands {
    use super::*;

    #[test]
    fn test_version_query_header() {
        let header = ControlHeader::new(CONTROL_SPECIAL_RESID, CONTROL_GET_VERSION, 1);
        let setup = header.usb_setup();

        assert_eq!(setup.index, 0);
        assert_eq!(setup.value, 0x80);
        assert_eq!(setup.length, 1);
        assert_eq!(setup.request_type, 0xC0);
    }

    #[test]
    fn test_last_status_header() {
        let header = ControlHeader::new(CONTROL_SPECIAL_RESID, CONTROL_GET_LAST_COMMAND_STATUS, 1);
        assert_eq!(header.encode_stream(), [0, 0x81, 1, 0]);
    }
}

mod stream_frames {
    use super::*;

    #[test]
    fn test_zero_length_frame() {
        let header = ControlHeader::write(ResourceId(3), Command(0x10), 0);
        let frame = encode_frame(&header, &[]);
        assert_eq!(&frame[..], &[3, 0x10, 0, 0]);

        let (decoded, payload) = decode_frame(&frame).unwrap();
        assert_eq!(decoded, header);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_pad_byte_ignored_on_decode() {
        let (header, _) = decode_frame(&[3, 0x10, 0, 0xFF]).unwrap();
        assert_eq!(header, ControlHeader::new(ResourceId(3), Command(0x10), 0));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            decode_frame(&[]).unwrap_err(),
            ProtocolError::IncompleteHeader {
                expected: STREAM_HEADER_LEN,
                actual: 0
            }
        );
    }
}
