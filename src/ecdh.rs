//! NIST P-256 scalar multiplication: the loaded scalar times a host-chosen point.
//!
//! The scalar arrives as 32 big-endian bytes and is reduced modulo the group order when loaded,
//! never rejected. Points arrive as big-endian affine coordinates `x || y`. A point which is not
//! on the curve (or has a coordinate outside the field) is answered with 64 zero bytes without
//! running the multiplication, and therefore without raising the trigger. The on-curve check is
//! not what is being measured and always runs before the window opens.
//!
//! Products at infinity (scalar equivalent to zero) have no affine coordinates and are also
//! answered with the all-zero pair.

use p256::elliptic_curve::bigint::U256;
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};

use crate::cursor::{ReadCursor, WriteCursor};
use crate::interface::Trigger;
use crate::oracle::{Oracle, TriggerWindow};

/// Size of a field element or scalar
pub const ELEM_LEN: usize = 32;

/// P-256 point multiplication oracle; the session state is the scalar
#[derive(Debug, Clone, Copy)]
pub struct P256Oracle {
    /// Scalar loaded by the last `k` command, already reduced
    scalar: Scalar,
}

impl P256Oracle {
    /// Creates an oracle with the zero scalar loaded
    pub fn new() -> Self {
        Self {
            scalar: Scalar::ZERO,
        }
    }

    /// Parses big-endian affine coordinates, returning the point only if it lies on the curve
    fn validate(x: [u8; ELEM_LEN], y: [u8; ELEM_LEN]) -> Option<AffinePoint> {
        let encoded =
            EncodedPoint::from_affine_coordinates(&FieldBytes::from(x), &FieldBytes::from(y), false);
        AffinePoint::from_encoded_point(&encoded).into()
    }
}

impl Default for P256Oracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle for P256Oracle {
    const KEY_LEN: usize = ELEM_LEN;
    const INPUT_LEN: usize = 2 * ELEM_LEN;
    const OUTPUT_LEN: usize = 2 * ELEM_LEN;

    fn load_key(&mut self, key: &[u8]) {
        let mut bytes = FieldBytes::default();
        ReadCursor::new(key).copy_to(&mut bytes);
        self.scalar = <Scalar as Reduce<U256>>::reduce_bytes(&bytes);
    }

    fn operate<T: Trigger>(&mut self, trigger: &mut T, data: &mut [u8]) -> usize {
        let mut cur = ReadCursor::new(&data[..Self::INPUT_LEN]);
        let x = cur.read_literal::<ELEM_LEN>();
        let y = cur.read_literal::<ELEM_LEN>();

        let product = Self::validate(x, y).map(|point| {
            let scalar = self.scalar;
            TriggerWindow::measure(trigger, || (ProjectivePoint::from(point) * scalar).to_affine())
        });

        let encoded = product.map(|point| point.to_encoded_point(false));
        let out = WriteCursor::new(&mut data[..Self::OUTPUT_LEN]);
        match encoded.as_ref().and_then(|e| e.x().zip(e.y())) {
            Some((x, y)) => out.write(x).write(y),
            None => out.fill(0, Self::OUTPUT_LEN),
        };

        Self::OUTPUT_LEN
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use p256::elliptic_curve::sec1::ToEncodedPoint;
    use p256::{ProjectivePoint, Scalar};

    use super::{P256Oracle, ELEM_LEN};
    use crate::interface::mock::{Event, MockPort};
    use crate::oracle::Oracle;

    const GX: [u8; 32] = hex!("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296");
    const GY: [u8; 32] = hex!("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5");
    const ORDER: [u8; 32] = hex!("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551");

    fn point(x: &[u8], y: &[u8]) -> [u8; 64] {
        let mut data = [0_u8; 64];
        data[..ELEM_LEN].copy_from_slice(x);
        data[ELEM_LEN..].copy_from_slice(y);
        data
    }

    fn encode(p: ProjectivePoint) -> [u8; 64] {
        let encoded = p.to_affine().to_encoded_point(false);
        point(encoded.x().unwrap(), encoded.y().unwrap())
    }

    fn multiply(scalar: &[u8], input: [u8; 64]) -> ([u8; 64], MockPort) {
        let mut oracle = P256Oracle::new();
        let mut port = MockPort::default();
        oracle.load_key(scalar);
        let mut data = input;
        assert_eq!(oracle.operate(&mut port, &mut data), 64);
        (data, port)
    }

    fn scalar_bytes(n: u64) -> [u8; 32] {
        let mut bytes = [0_u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        bytes
    }

    #[test]
    fn one_times_generator_is_generator() {
        let (out, _) = multiply(&scalar_bytes(1), point(&GX, &GY));

        assert_eq!(out, point(&GX, &GY));
    }

    #[test]
    fn two_times_generator() {
        let (out, _) = multiply(&scalar_bytes(2), point(&GX, &GY));

        assert_eq!(
            out,
            point(
                &hex!("7cf27b188d034f7e8a52380304b51ac3c08969e277f21b35a60b48fc47669978"),
                &hex!("07775510db8ed040293d9ac69f7430dbba7dade63ce982299e04b79d227873d1"),
            )
        );
    }

    #[test]
    fn known_scalar_times_generator() {
        let (out, port) = multiply(&scalar_bytes(0x1234_5678), point(&GX, &GY));

        let expected = ProjectivePoint::GENERATOR * Scalar::from(0x1234_5678_u64);
        assert_eq!(out, encode(expected));
        assert_eq!(port.events(), &[Event::High, Event::Low]);
    }

    #[test]
    fn order_minus_one_negates_the_point() {
        let mut scalar = ORDER;
        scalar[31] -= 1;

        let (out, _) = multiply(&scalar, point(&GX, &GY));

        assert_eq!(out, encode(-ProjectivePoint::GENERATOR));
    }

    #[test]
    fn scalars_wrap_around_the_order() {
        let mut scalar = ORDER;
        scalar[31] += 1;

        let (out, _) = multiply(&scalar, point(&GX, &GY));

        assert_eq!(out, point(&GX, &GY));
    }

    #[test]
    fn product_at_infinity_is_the_zero_pair() {
        let (by_order, port) = multiply(&ORDER, point(&GX, &GY));
        let (by_zero, _) = multiply(&[0_u8; 32], point(&GX, &GY));

        assert_eq!(by_order, [0_u8; 64]);
        assert_eq!(by_zero, [0_u8; 64]);
        assert_eq!(port.windows(), 1);
    }

    #[test]
    fn off_curve_point_is_the_zero_pair_without_a_window() {
        let mut y = GY;
        y[31] ^= 1;

        let (out, port) = multiply(&scalar_bytes(7), point(&GX, &y));

        assert_eq!(out, [0_u8; 64]);
        assert!(port.events().is_empty());
    }

    #[test]
    fn origin_and_out_of_field_coordinates_are_rejected() {
        let (origin, origin_port) = multiply(&scalar_bytes(7), [0_u8; 64]);
        let (saturated, saturated_port) = multiply(&scalar_bytes(7), [0xff_u8; 64]);

        assert_eq!(origin, [0_u8; 64]);
        assert_eq!(saturated, [0_u8; 64]);
        assert_eq!(origin_port.windows() + saturated_port.windows(), 0);
    }

    #[test]
    fn scalar_persists_across_requests() {
        let mut oracle = P256Oracle::new();
        let mut port = MockPort::default();
        oracle.load_key(&scalar_bytes(3));
        oracle.reset();

        let mut first = point(&GX, &GY);
        let mut second = point(&GX, &GY);
        oracle.operate(&mut port, &mut first);
        oracle.operate(&mut port, &mut second);

        assert_eq!(first, second);
        assert_eq!(first, encode(ProjectivePoint::GENERATOR * Scalar::from(3_u64)));
        assert_eq!(port.windows(), 2);
    }
}
