use crate::error::SerializationError;
use gradgraph_core::{Matrix, Scalar};
use std::io::{Read, Write};

/// Upper bound on elements preallocated from an untrusted header.
const PREALLOCATION_LIMIT: usize = 1 << 16;

fn write_u32<W: Write>(writer: &mut W, value: usize, what: &str) -> Result<(), SerializationError> {
    let value = u32::try_from(value).map_err(|_| {
        SerializationError::Malformed(format!("{} {} does not fit in u32", what, value))
    })?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<usize, SerializationError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes) as usize)
}

/// Writes one matrix: `u32 rows`, `u32 cols`, then the values row-major.
pub fn write_matrix<W: Write>(writer: &mut W, matrix: &Matrix) -> Result<(), SerializationError> {
    write_u32(writer, matrix.rows(), "row count")?;
    write_u32(writer, matrix.cols(), "column count")?;
    for value in matrix.as_slice() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Reads one matrix written by [`write_matrix`].
///
/// # Errors
/// `Malformed` for an empty shape, `Io` (unexpected EOF) for a truncated body.
pub fn read_matrix<R: Read>(reader: &mut R) -> Result<Matrix, SerializationError> {
    let rows = read_u32(reader)?;
    let cols = read_u32(reader)?;
    if rows == 0 || cols == 0 {
        return Err(SerializationError::Malformed(format!(
            "matrix shape {}x{} is empty",
            rows, cols
        )));
    }
    let len = rows.checked_mul(cols).ok_or_else(|| {
        SerializationError::Malformed(format!("matrix shape {}x{} overflows", rows, cols))
    })?;

    let mut data = Vec::with_capacity(len.min(PREALLOCATION_LIMIT));
    let mut bytes = [0u8; 8];
    for _ in 0..len {
        reader.read_exact(&mut bytes)?;
        data.push(Scalar::from_le_bytes(bytes));
    }
    Ok(Matrix::new(rows, cols, data)?)
}

/// Writes a `u32` count followed by every matrix.
pub fn write_matrices<'a, W, I>(writer: &mut W, matrices: I) -> Result<(), SerializationError>
where
    W: Write,
    I: IntoIterator<Item = &'a Matrix>,
    I::IntoIter: ExactSizeIterator,
{
    let matrices = matrices.into_iter();
    write_u32(writer, matrices.len(), "matrix count")?;
    for matrix in matrices {
        write_matrix(writer, matrix)?;
    }
    Ok(())
}

pub fn read_matrices<R: Read>(reader: &mut R) -> Result<Vec<Matrix>, SerializationError> {
    let count = read_u32(reader)?;
    let mut matrices = Vec::with_capacity(count.min(PREALLOCATION_LIMIT));
    for _ in 0..count {
        matrices.push(read_matrix(reader)?);
    }
    Ok(matrices)
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;
