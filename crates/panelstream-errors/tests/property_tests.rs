//! Property tests for error classification invariants.

use panelstream_errors::prelude::*;
use proptest::prelude::*;

fn device_error_strategy() -> impl Strategy<Value = DeviceError> {
    let loc = "[a-z0-9:/-]{1,16}";
    prop_oneof![
        loc.prop_map(DeviceError::NotFound),
        loc.prop_map(DeviceError::Disconnected),
        loc.prop_map(DeviceError::PermissionDenied),
        loc.prop_map(DeviceError::Busy),
        (loc, 1u64..10_000).prop_map(|(d, t)| DeviceError::timeout(d, t)),
        (loc, "[a-z ]{0,24}").prop_map(|(d, m)| DeviceError::io(d, m)),
        (loc, 1usize..4096, 0usize..4096).prop_map(|(d, e, w)| DeviceError::ShortWrite {
            device: d,
            expected: e,
            written: w,
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_unavailable_and_retryable_are_exclusive(err in device_error_strategy()) {
        prop_assert!(!(err.is_device_unavailable() && err.is_retryable()));
    }

    #[test]
    fn prop_unavailable_means_critical(err in device_error_strategy()) {
        prop_assert_eq!(
            err.is_device_unavailable(),
            err.severity() == ErrorSeverity::Critical
        );
    }

    #[test]
    fn prop_retryable_errors_are_recoverable(err in device_error_strategy()) {
        let retryable = err.is_retryable();
        let wrapped: PanelError = err.into();
        if retryable {
            prop_assert!(wrapped.is_recoverable());
        }
        prop_assert_eq!(wrapped.category(), ErrorCategory::Device);
    }

    #[test]
    fn prop_display_names_the_device(err in device_error_strategy()) {
        let msg = err.to_string();
        let device = match &err {
            DeviceError::NotFound(d)
            | DeviceError::Disconnected(d)
            | DeviceError::PermissionDenied(d)
            | DeviceError::Busy(d) => d.clone(),
            DeviceError::Timeout { device, .. }
            | DeviceError::Io { device, .. }
            | DeviceError::ShortWrite { device, .. } => device.clone(),
            _ => return Ok(()),
        };
        prop_assert!(msg.contains(&device));
    }
}

#[test]
fn session_error_wraps_handshake() {
    let hs = HandshakeError::StillBooting {
        device: "usb:2-1".into(),
        attempts: 5,
    };
    let err: SessionError = hs.into();
    assert_eq!(err.severity(), ErrorSeverity::Warning);
    let top: PanelError = err.into();
    assert_eq!(top.category(), ErrorCategory::Session);
}
