use kflat_core::{TypeId, TypeRegistry};
use kflat_image::Image;

use crate::test_utils::{item_chain, item_types};
use crate::{
    CaptureTarget, EnableRequest, FlattenConfig, FlattenContext, FlattenError, Session,
    SessionError, SimMemory, SourceMemory,
};

struct ChainTarget {
    mem: SimMemory,
    types: TypeRegistry,
    item: TypeId,
    head: u64,
}

impl ChainTarget {
    fn new() -> Self {
        let (types, item) = item_types();
        let mut mem = SimMemory::new();
        let head = item_chain(&mut mem, &[1, 2, 3], false)[0];
        Self {
            mem,
            types,
            item,
            head,
        }
    }
}

impl CaptureTarget for ChainTarget {
    fn name(&self) -> &str {
        "CHAIN"
    }

    fn memory(&self) -> &dyn SourceMemory {
        &self.mem
    }

    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn capture(&self, flat: &mut FlattenContext<'_>) -> Result<(), FlattenError> {
        flat.flatten_root("chain", self.head, self.item)?;
        Ok(())
    }
}

fn session(config: FlattenConfig) -> Session {
    let mut session = Session::new(config);
    session.register(Box::new(ChainTarget::new()));
    session
}

#[test]
fn capture_cycle() {
    let mut session = session(FlattenConfig::default());

    session.begin(EnableRequest::new("CHAIN")).unwrap();
    assert!(session.is_enabled());
    assert!(session.invoke(100).unwrap());
    assert!(!session.invoke(100).unwrap());

    let report = session.end().unwrap();
    assert_eq!(report.invoked, 2);
    assert!(report.error.is_none());
    assert!(!session.is_enabled());

    let image = Image::from_bytes(session.map().unwrap()).unwrap();
    assert_eq!(report.size, image.bytes().len() as u64);
    assert_eq!(image.nodes().len(), 3);
    assert_eq!(image.root("chain").unwrap().type_name, "item");
}

#[test]
fn pid_filter() {
    let mut session = session(FlattenConfig::default());
    let request = EnableRequest {
        pid: Some(7),
        ..EnableRequest::new("CHAIN")
    };

    session.begin(request).unwrap();
    assert!(!session.invoke(3).unwrap());
    assert!(session.invoke(7).unwrap());
    assert_eq!(session.end().unwrap().invoked, 1);
}

#[test]
fn failed_run_keeps_no_image() {
    let mut session = session(FlattenConfig::default().max_size(8));

    session.begin(EnableRequest::new("CHAIN")).unwrap();
    session.invoke(1).unwrap();
    let report = session.end().unwrap();

    assert_eq!(report.size, 0);
    assert!(matches!(
        report.error,
        Some(FlattenError::SizeExceeded { limit: 8, .. })
    ));
    assert_eq!(session.map().unwrap_err(), SessionError::NoImage);
}

#[test]
fn end_without_invocation() {
    let mut session = session(FlattenConfig::default());

    session.begin(EnableRequest::new("CHAIN")).unwrap();
    let report = session.end().unwrap();

    assert_eq!(report.invoked, 0);
    assert!(report.error.is_none());
    assert_eq!(session.map().unwrap_err(), SessionError::NoImage);
}

#[test]
fn control_errors() {
    let mut session = session(FlattenConfig::default());

    assert_eq!(session.invoke(1).unwrap_err(), SessionError::NotEnabled);
    assert_eq!(session.end().unwrap_err(), SessionError::NotEnabled);

    let err = session.begin(EnableRequest::new("NOPE")).unwrap_err();
    insta::assert_snapshot!(err, @"unknown capture target `NOPE`");

    session.begin(EnableRequest::new("CHAIN")).unwrap();
    let err = session.begin(EnableRequest::new("CHAIN")).unwrap_err();
    assert_eq!(err, SessionError::AlreadyEnabled);
}

#[test]
fn new_capture_replaces_image() {
    let mut session = session(FlattenConfig::default());
    for _ in 0..2 {
        session.begin(EnableRequest::new("CHAIN")).unwrap();
        session.invoke(1).unwrap();
        session.end().unwrap();
    }

    let first = session.take_image().unwrap();
    assert!(session.take_image().is_none());
    assert_eq!(Image::from_bytes(&first).unwrap().roots().len(), 1);
}
