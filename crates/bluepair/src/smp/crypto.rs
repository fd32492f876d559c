//! Cryptographic functions for the Security Manager Protocol
//!
//! The toolbox of Vol 3, Part H, 2.2. Values are `u128` in the notation of
//! the Core specification, most significant octet first; PDU fields are
//! converted with `u128::from_le_bytes` / `to_le_bytes` at the call site.
//! P-256 coordinates and the DHKey are 32-byte big-endian arrays.

use super::constants::SMP_PASSKEY_MAX;
use super::pdu::PairingPublicKey;
use crate::gap::BdAddr;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::digest::{FixedOutput, Update};
use cmac::Cmac;
use p256::ecdh;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use std::fmt;

/// SALT of f5
const F5_SALT: u128 = 0x6C88_8391_AAF5_A538_6037_0BDB_5A60_83BE;
/// keyID of f5, "btle"
const F5_KEY_ID: [u8; 4] = *b"btle";
/// Length of f5 output in bits
const F5_LENGTH: [u8; 2] = [0x01, 0x00];
/// keyID "tmp1" of the link key conversion
const KEY_ID_TMP1: [u8; 4] = *b"tmp1";
/// keyID "lebr" of the link key conversion
const KEY_ID_LEBR: [u8; 4] = *b"lebr";

/// Security function e: AES-128 of one block
pub fn e(key: u128, plain_text: u128) -> u128 {
    let cipher = Aes128::new(&GenericArray::from(key.to_be_bytes()));
    let mut block = GenericArray::from(plain_text.to_be_bytes());
    cipher.encrypt_block(&mut block);
    u128::from_be_bytes(*block.as_ref())
}

/// AES-CMAC of RFC 4493
pub fn aes_cmac(key: u128, message: &[u8]) -> u128 {
    let mut mac = <Cmac<Aes128> as KeyInit>::new(&GenericArray::from(key.to_be_bytes()));
    mac.update(message);
    u128::from_be_bytes(*mac.finalize_fixed().as_ref())
}

/// Interpret wire octets (little-endian) as an integer
fn wire_value(bytes: &[u8]) -> u128 {
    bytes
        .iter()
        .rev()
        .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte))
}

/// Confirm value generation function c1 for LE legacy pairing
///
/// `preq` and `pres` are the Pairing Request and Pairing Response PDUs as
/// sent on the wire, code octet included. `iat` and `rat` are the address
/// type bits of the initiating and responding device.
#[allow(clippy::too_many_arguments)]
pub fn c1(
    k: u128,
    r: u128,
    preq: &[u8; 7],
    pres: &[u8; 7],
    iat: u8,
    ia: &BdAddr,
    rat: u8,
    ra: &BdAddr,
) -> u128 {
    let p1 = (wire_value(pres) << 72)
        | (wire_value(preq) << 16)
        | (u128::from(rat & 1) << 8)
        | u128::from(iat & 1);
    let p2 = (u128::from(ia.to_u64()) << 48) | u128::from(ra.to_u64());

    e(k, e(k, r ^ p1) ^ p2)
}

/// Key generation function s1 for LE legacy pairing
///
/// The STK is `s1(TK, Srand, Mrand)`.
pub fn s1(k: u128, r1: u128, r2: u128) -> u128 {
    const LOW: u128 = 0xFFFF_FFFF_FFFF_FFFF;
    e(k, ((r1 & LOW) << 64) | (r2 & LOW))
}

/// Confirm value generation function f4 for LE Secure Connections
pub fn f4(u: &[u8; 32], v: &[u8; 32], x: u128, z: u8) -> u128 {
    let mut m = [0u8; 65];
    m[..32].copy_from_slice(u);
    m[32..64].copy_from_slice(v);
    m[64] = z;
    aes_cmac(x, &m)
}

/// Key generation function f5 for LE Secure Connections
///
/// Returns `(MacKey, LTK)`. `a1` and `a2` are 56-bit pairing addresses,
/// see [`crate::gap::AddressWithType::to_pairing_address`].
pub fn f5(w: &[u8; 32], n1: u128, n2: u128, a1: &[u8; 7], a2: &[u8; 7]) -> (u128, u128) {
    let t = aes_cmac(F5_SALT, w);

    let mut m = [0u8; 53];
    m[1..5].copy_from_slice(&F5_KEY_ID);
    m[5..21].copy_from_slice(&n1.to_be_bytes());
    m[21..37].copy_from_slice(&n2.to_be_bytes());
    m[37..44].copy_from_slice(a1);
    m[44..51].copy_from_slice(a2);
    m[51..].copy_from_slice(&F5_LENGTH);

    let mac_key = aes_cmac(t, &m);
    m[0] = 1;
    let ltk = aes_cmac(t, &m);

    (mac_key, ltk)
}

/// Check value generation function f6 for LE Secure Connections
///
/// `io_cap` is AuthReq, OOB data flag and IO capability, in that order.
#[allow(clippy::too_many_arguments)]
pub fn f6(
    w: u128,
    n1: u128,
    n2: u128,
    r: u128,
    io_cap: &[u8; 3],
    a1: &[u8; 7],
    a2: &[u8; 7],
) -> u128 {
    let mut m = [0u8; 65];
    m[..16].copy_from_slice(&n1.to_be_bytes());
    m[16..32].copy_from_slice(&n2.to_be_bytes());
    m[32..48].copy_from_slice(&r.to_be_bytes());
    m[48..51].copy_from_slice(io_cap);
    m[51..58].copy_from_slice(a1);
    m[58..].copy_from_slice(a2);
    aes_cmac(w, &m)
}

/// Numeric comparison value generation function g2
///
/// Returns the six digit value shown to the user.
pub fn g2(u: &[u8; 32], v: &[u8; 32], x: u128, y: u128) -> u32 {
    let mut m = [0u8; 80];
    m[..32].copy_from_slice(u);
    m[32..64].copy_from_slice(v);
    m[64..].copy_from_slice(&y.to_be_bytes());
    (aes_cmac(x, &m) as u32) % (SMP_PASSKEY_MAX + 1)
}

/// Link key conversion function h6
pub fn h6(w: u128, key_id: &[u8; 4]) -> u128 {
    aes_cmac(w, key_id)
}

/// Link key conversion function h7
pub fn h7(salt: u128, w: u128) -> u128 {
    aes_cmac(salt, &w.to_be_bytes())
}

/// Derive a BR/EDR link key from an LE long term key
///
/// `use_h7` selects h7 for the intermediate key, as negotiated by the CT2
/// AuthReq bit.
pub fn ltk_to_link_key(ltk: u128, use_h7: bool) -> u128 {
    let ilk = if use_h7 {
        h7(u128::from(u32::from_be_bytes(KEY_ID_TMP1)), ltk)
    } else {
        h6(ltk, &KEY_ID_TMP1)
    };
    h6(ilk, &KEY_ID_LEBR)
}

/// Fill an array from the operating system RNG
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// Random 128-bit nonce
pub fn random_u128() -> u128 {
    u128::from_le_bytes(random_bytes())
}

/// Generate a random passkey (0-999999)
pub fn generate_passkey() -> u32 {
    OsRng.gen_range(0..=SMP_PASSKEY_MAX)
}

/// P-256 public key with big-endian coordinates
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl PublicKey {
    /// Public key received in a Pairing Public Key PDU
    pub fn from_pdu(pdu: &PairingPublicKey) -> Self {
        let mut x = pdu.x;
        let mut y = pdu.y;
        x.reverse();
        y.reverse();
        Self { x, y }
    }

    /// Pairing Public Key PDU carrying this key
    pub fn to_pdu(&self) -> PairingPublicKey {
        let mut x = self.x;
        let mut y = self.y;
        x.reverse();
        y.reverse();
        PairingPublicKey { x, y }
    }

    fn to_p256(self) -> Option<p256::PublicKey> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..33].copy_from_slice(&self.x);
        sec1[33..].copy_from_slice(&self.y);
        p256::PublicKey::from_sec1_bytes(&sec1).ok()
    }

    /// Whether the point lies on the P-256 curve
    pub fn is_valid(&self) -> bool {
        self.to_p256().is_some()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("x", &hex::encode(self.x))
            .field("y", &hex::encode(self.y))
            .finish()
    }
}

/// P-256 key pair used for the Secure Connections key exchange
#[derive(Clone)]
pub struct EcdhKeyPair {
    secret: p256::NonZeroScalar,
    public: PublicKey,
}

impl EcdhKeyPair {
    /// Generate a fresh key pair
    pub fn generate() -> Self {
        Self::from_scalar(p256::NonZeroScalar::random(&mut OsRng))
    }

    /// Key pair from a big-endian private key, `None` if out of range
    pub fn from_private_key(private_key: &[u8; 32]) -> Option<Self> {
        let repr = p256::FieldBytes::clone_from_slice(private_key);
        let secret: Option<p256::NonZeroScalar> = p256::NonZeroScalar::from_repr(repr).into();
        secret.map(Self::from_scalar)
    }

    fn from_scalar(secret: p256::NonZeroScalar) -> Self {
        use p256::elliptic_curve::sec1::ToEncodedPoint;

        let point = p256::PublicKey::from_secret_scalar(&secret).to_encoded_point(false);
        let mut public = PublicKey {
            x: [0u8; 32],
            y: [0u8; 32],
        };
        if let (Some(x), Some(y)) = (point.x(), point.y()) {
            public.x.copy_from_slice(x);
            public.y.copy_from_slice(y);
        }
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Compute the DHKey shared with `remote`
    ///
    /// Returns `None` if the remote key is not on the curve or equals the
    /// local public key.
    pub fn dh_key(&self, remote: &PublicKey) -> Option<[u8; 32]> {
        if *remote == self.public {
            return None;
        }
        let remote = remote.to_p256()?;
        let shared = ecdh::diffie_hellman(&self.secret, remote.as_affine());
        let mut dh_key = [0u8; 32];
        dh_key.copy_from_slice(shared.raw_secret_bytes());
        Some(dh_key)
    }
}

impl fmt::Debug for EcdhKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdhKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
