use crate::{BinaryStream, FlattenError};

#[test]
fn offsets_grow_monotonically() {
    let mut stream = BinaryStream::new(1024);

    assert_eq!(stream.append(b"abc").unwrap(), 0);
    assert_eq!(stream.append(b"de").unwrap(), 3);
    assert_eq!(stream.len(), 5);
    assert_eq!(stream.chunks().len(), 2);
    assert_eq!(stream.chunks()[1].offset(), 3);
}

#[test]
fn empty_append_takes_position() {
    let mut stream = BinaryStream::new(1024);
    stream.append(b"abc").unwrap();

    assert_eq!(stream.append(&[]).unwrap(), 3);
    assert_eq!(stream.append(b"x").unwrap(), 3);
    assert!(stream.chunks()[1].is_empty());
}

#[test]
fn aligned_append_pads_with_zeros() {
    let mut stream = BinaryStream::new(1024);
    stream.append(b"abc").unwrap();

    assert_eq!(stream.append_aligned(b"12345678", 8).unwrap(), 8);
    assert_eq!(stream.append_aligned(b"z", 8).unwrap(), 16);

    let mut out = Vec::new();
    stream.write_into(&mut out).unwrap();
    assert_eq!(out, b"abc\0\0\0\0\012345678z");
}

#[test]
fn limit_enforced() {
    let mut stream = BinaryStream::new(8);
    stream.append(b"1234").unwrap();

    let err = stream.append(b"56789").unwrap_err();
    assert!(matches!(
        err,
        FlattenError::SizeExceeded {
            limit: 8,
            attempted: 9
        }
    ));
    // A failed append leaves the stream untouched.
    assert_eq!(stream.len(), 4);
    assert_eq!(stream.append(b"5678").unwrap(), 4);
}

#[test]
fn padding_counts_against_limit() {
    let mut stream = BinaryStream::new(10);
    stream.append(b"1").unwrap();

    let err = stream.append_aligned(&[0; 4], 8).unwrap_err();
    assert!(matches!(err, FlattenError::SizeExceeded { attempted: 12, .. }));
}
