use rig_core::RigError;
use rig_core::hw_error::map_hw_error;
use rig_hardware::error::HwError;
use rstest::rstest;

#[rstest]
#[case(HwError::Timeout, RigError::Timeout)]
#[case(HwError::Disconnected, RigError::Connectivity("device disconnected".into()))]
#[case(HwError::Protocol("bad frame".into()), RigError::Protocol("bad frame".into()))]
fn hardware_errors_map_to_typed_variants(#[case] hw: HwError, #[case] expected: RigError) {
    assert_eq!(map_hw_error(&hw), expected);
}

#[test]
fn rejected_command_is_a_device_fault() {
    let err = map_hw_error(&HwError::Rejected("start".into()));
    assert!(matches!(err, RigError::DeviceFault(_)));
}

#[test]
fn boxed_trait_errors_are_downcast() {
    let boxed: rig_traits::BoxError = Box::new(HwError::Timeout);
    assert_eq!(map_hw_error(&*boxed), RigError::Timeout);
}
