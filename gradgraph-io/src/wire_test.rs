use super::*;
use std::io::{Cursor, ErrorKind};

#[test]
fn test_matrix_layout() -> Result<(), SerializationError> {
    let m = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.5]])?;
    let mut buffer = Vec::new();
    write_matrix(&mut buffer, &m)?;

    assert_eq!(buffer.len(), 4 + 4 + 6 * 8);
    assert_eq!(&buffer[0..4], &3u32.to_le_bytes());
    assert_eq!(&buffer[4..8], &2u32.to_le_bytes());
    assert_eq!(&buffer[8..16], &1.0f64.to_le_bytes());
    // row-major: the second value is (0, 1)
    assert_eq!(&buffer[16..24], &2.0f64.to_le_bytes());
    assert_eq!(&buffer[48..56], &6.5f64.to_le_bytes());

    let decoded = read_matrix(&mut Cursor::new(buffer))?;
    assert_eq!(decoded, m);
    Ok(())
}

#[test]
fn test_matrices_keep_order_and_count() -> Result<(), SerializationError> {
    let matrices = vec![
        Matrix::scalar(-1.5),
        Matrix::row_vector(vec![1.0, 2.0, 3.0]),
        Matrix::column_vector(vec![f64::MAX, f64::MIN_POSITIVE]),
    ];
    let mut buffer = Vec::new();
    write_matrices(&mut buffer, &matrices)?;
    assert_eq!(&buffer[0..4], &3u32.to_le_bytes());

    let decoded = read_matrices(&mut Cursor::new(buffer))?;
    assert_eq!(decoded, matrices);

    let mut empty = Vec::new();
    write_matrices(&mut empty, &Vec::<Matrix>::new())?;
    assert_eq!(empty, 0u32.to_le_bytes());
    assert!(read_matrices(&mut Cursor::new(empty))?.is_empty());
    Ok(())
}

#[test]
fn test_truncated_stream_is_io_error() -> Result<(), SerializationError> {
    let mut buffer = Vec::new();
    write_matrix(&mut buffer, &Matrix::ones(2, 2))?;
    buffer.truncate(buffer.len() - 3);
    match read_matrix(&mut Cursor::new(buffer)) {
        Err(SerializationError::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
        other => panic!("expected EOF, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_empty_shape_is_malformed() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&0u32.to_le_bytes());
    buffer.extend_from_slice(&4u32.to_le_bytes());
    assert!(matches!(
        read_matrix(&mut Cursor::new(buffer)),
        Err(SerializationError::Malformed(_))
    ));
}
