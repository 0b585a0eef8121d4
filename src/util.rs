//! Common helpers

use crate::frame::Value;

/// Calculate the number of bytes required for a given number of coils.
pub const fn packed_coils_len(bitcount: usize) -> usize {
    bitcount.div_ceil(8)
}

/// Pack coil states into the byte layout of a read-coils response.
///
/// A value is `ON` iff it is greater than zero. Values are taken in groups
/// of eight; within a byte, the first value of the group occupies the least
/// significant bit. The first group fills the *last* output byte and each
/// following group the byte before it, so the (possibly partial) final
/// group ends up at index 0.
pub fn pack_coils(values: &[Value]) -> Vec<u8> {
    let len = packed_coils_len(values.len());
    let mut packed = vec![0u8; len];
    for (group, chunk) in values.chunks(8).enumerate() {
        let mut byte = 0u8;
        for (i, v) in chunk.iter().enumerate() {
            if v.get() > 0 {
                byte |= 1 << i;
            }
        }
        packed[len - 1 - group] = byte;
    }
    packed
}

#[cfg(test)]
mod tests {

    use super::*;

    fn values(states: &[i32]) -> Vec<Value> {
        states.iter().map(|v| Value::new(*v).unwrap()).collect()
    }

    #[test]
    fn packed_len() {
        assert_eq!(packed_coils_len(0), 0);
        assert_eq!(packed_coils_len(1), 1);
        assert_eq!(packed_coils_len(8), 1);
        assert_eq!(packed_coils_len(9), 2);
        assert_eq!(packed_coils_len(17), 3);
    }

    #[test]
    fn pack_single_group() {
        assert_eq!(pack_coils(&values(&[0, 1, 1, 1])), [0x0E]);
    }

    #[test]
    fn pack_partial_group_fills_first_byte() {
        assert_eq!(
            pack_coils(&values(&[1, 0, 1, 0, 1, 0, 1, 0, 1])),
            [0x01, 0x55]
        );
    }

    #[test]
    fn pack_three_groups() {
        assert_eq!(
            pack_coils(&values(&[1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0])),
            [0x00, 0x01, 0x01]
        );
    }

    #[test]
    fn pack_empty() {
        assert_eq!(pack_coils(&[]), Vec::<u8>::new());
    }

    #[test]
    fn pack_treats_any_positive_value_as_on() {
        assert_eq!(pack_coils(&values(&[2, 65535, -1, 0])), [0x03]);
    }
}
