//! End-to-end session scenarios and invariants (spec.md §8).

use ninep_client::{ClientError, Session, SessionConfig};
use ninep_harness::{build_frame, mock_pair, peek_header, seed_dir, Command};
use ninep_proto::{CodecError, MsgType, NOTAG};

type TestSession = Session<ninep_harness::MockTransport>;

fn versioned(controller: &ninep_harness::Controller, session: &mut TestSession) {
    controller.arm(Command::RversionSuccess);
    session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap();
}

fn attached(controller: &ninep_harness::Controller, session: &mut TestSession) -> u32 {
    controller.arm(Command::RattachSuccess);
    session.attach("glenda", "").unwrap();
    session.rootfid().unwrap()
}

#[test]
fn s1_successful_version() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::RversionSuccess);
    session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap();

    assert_eq!(session.phase(), ninep_client::Phase::Versioned);
    assert_eq!(session.msize(), 8192);

    let sent = controller.sent();
    let (size, typ, tag) = peek_header(&sent);
    assert_eq!(size as usize, sent.len());
    assert_eq!(typ, MsgType::Tversion as u8);
    assert_eq!(tag, NOTAG);
}

#[test]
fn s2_downgraded_msize() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    let reply = build_frame(MsgType::Rversion as u8, NOTAG, 32, |w| {
        w.u32(4096).unwrap();
        w.string("9P2000").unwrap();
    });
    controller.arm_bytes(reply);

    session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap();
    assert_eq!(session.phase(), ninep_client::Phase::Versioned);
    assert_eq!(session.msize(), 4096);
}

#[test]
fn s3_oversize_msize_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::RversionMsizeTooBig);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert_eq!(err, ClientError::ProtocolViolation);
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn s4_rstat_round_trip() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);
    versioned(&controller, &mut session);
    let fid = attached(&controller, &mut session);

    controller.arm(Command::RstatSuccess);
    let dir = session.stat(fid).unwrap();
    assert_eq!(dir, seed_dir());
}

#[test]
fn s5_tag_mismatch() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::HeaderTagMismatch);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert_eq!(err, ClientError::TagMismatch);
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn s6_malformed_nstat() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);
    versioned(&controller, &mut session);
    let fid = attached(&controller, &mut session);

    controller.arm(Command::RstatNstatInvalid);
    let err = session.stat(fid).unwrap_err();

    assert_eq!(err, ClientError::Codec(CodecError::MalformedBody));
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn rversion_unknown_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::RversionUnknown);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert_eq!(err, ClientError::VersionUnsupported);
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn rversion_invalid_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::RversionInvalid);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert_eq!(err, ClientError::VersionUnsupported);
}

#[test]
fn rversion_version_too_long_accepted_at_codec_layer() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::RversionVersionTooLong);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    // Parses cleanly (no Codec error); rejected only because the long
    // string isn't the literal "9P2000" the client asked for.
    assert_eq!(err, ClientError::VersionUnsupported);
}

#[test]
fn header_too_short_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::HeaderTooShort1);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert!(err.closes_session());
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn header_too_large_truncated() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::HeaderTooLarge);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert_eq!(err, ClientError::Codec(CodecError::Truncated));
}

#[test]
fn header_wrong_type_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::HeaderWrongType);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert_eq!(err, ClientError::ProtocolViolation);
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn header_invalid_type_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::HeaderInvalidType);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert_eq!(err, ClientError::Codec(CodecError::UnknownType));
}

#[test]
fn rversion_invalid_len_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);

    controller.arm(Command::RversionInvalidLen);
    let err = session.version(SessionConfig { requested_msize: 8192, requested_version: "9P2000" }).unwrap_err();

    assert!(err.closes_session());
}

#[test]
fn rattach_invalid_len_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);
    versioned(&controller, &mut session);

    controller.arm(Command::RattachInvalidLen);
    let err = session.attach("glenda", "").unwrap_err();

    assert_eq!(err, ClientError::Codec(CodecError::MalformedBody));
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn header_type_mismatch_rejected() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);
    versioned(&controller, &mut session);

    // attach() allocates the first tag off a fresh table (0), matching
    // the tag this command's canned Rversion reply carries.
    controller.arm(Command::HeaderTypeMismatch);
    let err = session.attach("glenda", "").unwrap_err();

    assert_eq!(err, ClientError::ProtocolViolation);
    assert_eq!(session.phase(), ninep_client::Phase::Closed);
}

// Invariant 6 (spec.md §8): clunking an unknown/already-clunked fid is
// rejected locally, without contacting the server.
#[test]
fn clunk_of_unknown_fid_does_not_touch_transport() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);
    versioned(&controller, &mut session);

    let err = session.clunk(999).unwrap_err();

    assert_eq!(err, ClientError::UnknownFid);
    assert!(controller.sent().is_empty());
}

// Invariant 7 (spec.md §8): a successful walk gains exactly one new
// fid; a partial walk gains none.
#[test]
fn walk_full_keeps_new_fid_partial_releases_it() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);
    versioned(&controller, &mut session);
    let root = attached(&controller, &mut session);

    let full_walk = build_frame(MsgType::Rwalk as u8, 0, 64, |w| {
        w.u16(2).unwrap();
        w.qid(&ninep_proto::Qid::new(0, 1, 10)).unwrap();
        w.qid(&ninep_proto::Qid::new(0, 1, 11)).unwrap();
    });
    controller.arm_bytes(full_walk);
    let result = session.walk(root, &["usr", "glenda"]).unwrap();
    assert_eq!(result.wqids.len(), 2);
    let child = result.newfid;

    let partial_walk = build_frame(MsgType::Rwalk as u8, 0, 64, |w| {
        w.u16(1).unwrap();
        w.qid(&ninep_proto::Qid::new(0, 1, 20)).unwrap();
    });
    controller.arm_bytes(partial_walk);
    let err = session.walk(child, &["a", "b"]).unwrap_err();
    assert_eq!(err, ClientError::WalkPartial(1));
    // Partial walk's session is still usable (not closed).
    assert_ne!(session.phase(), ninep_client::Phase::Closed);
}

#[test]
fn rstat_success_fields_match_seed() {
    let (transport, controller) = mock_pair();
    let mut session = TestSession::new(transport);
    versioned(&controller, &mut session);
    let fid = attached(&controller, &mut session);

    controller.arm(Command::RstatSuccess);
    let dir = session.stat(fid).unwrap();

    assert_eq!(dir.typ, 9001);
    assert_eq!(dir.dev, 5);
    assert_eq!(dir.qid.raw_type(), 23);
    assert_eq!(dir.qid.version(), 2342);
    assert_eq!(dir.qid.path(), 1337);
    assert_eq!(dir.mode, ninep_proto::DMDIR);
    assert_eq!(dir.name, "testfile");
    assert_eq!(dir.uid, "testuser");
    assert_eq!(dir.gid, "testgroup");
    assert_eq!(dir.muid, "ken");
}
