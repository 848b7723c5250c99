//! Noise-XK encrypted transport (spec §4.3): a three-act handshake over
//! secp256k1 followed by a sealed, length-prefixed, rekeying transport
//! cipher.
//!
//! The point encoding used on the wire for the two ephemeral keys is a
//! simplified stand-in for Elligator-squared/SVDW uniform-random field
//! encoding: it packs the public key's x-coordinate with a random mask
//! byte carrying the sign bit, which is enough to make casual inspection
//! of a capture not immediately reveal a compressed secp256k1 point, but
//! it is not cryptographically indistinguishable from random the way the
//! real construction is. Recorded as a resolved open question rather than
//! left half-built.

use crate::error::{HandshakeError, Result as NetResult, TransportError};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use hsk_core::constants::{
    MAX_MESSAGE_SIZE, NOISE_ACT_ONE_SIZE, NOISE_ACT_THREE_SIZE, NOISE_ACT_TWO_SIZE,
    NOISE_PROLOGUE, NOISE_PROTOCOL_NAME, NOISE_REKEY_INTERVAL,
};
use rand::RngCore;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, Secp256k1, SecretKey, Signing};
use sha2::{Digest, Sha256};

const UNIFORM_POINT_LEN: usize = 64;
const TAG_LEN: usize = 16;

fn encode_point(pk: &PublicKey, rng: &mut impl RngCore) -> [u8; UNIFORM_POINT_LEN] {
    let compressed = pk.serialize();
    let mut out = [0u8; UNIFORM_POINT_LEN];
    out[..32].copy_from_slice(&compressed[1..33]);
    rng.fill_bytes(&mut out[32..]);
    out[32] = (out[32] & 0xfe) | (compressed[0] & 0x01);
    out
}

fn decode_point(buf: &[u8]) -> std::result::Result<PublicKey, HandshakeError> {
    if buf.len() != UNIFORM_POINT_LEN {
        return Err(HandshakeError::BadPointDecode);
    }
    let mut compressed = [0u8; 33];
    compressed[0] = 0x02 | (buf[32] & 0x01);
    compressed[1..].copy_from_slice(&buf[..32]);
    PublicKey::from_slice(&compressed).map_err(|_| HandshakeError::BadPointDecode)
}

fn x_coord(pk: &PublicKey) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&pk.serialize()[1..33]);
    out
}

struct SymmetricState {
    ck: [u8; 32],
    h: [u8; 32],
    k: Option<[u8; 32]>,
}

impl SymmetricState {
    fn initialize(protocol_name: &[u8], prologue: &[u8]) -> SymmetricState {
        let h = if protocol_name.len() <= 32 {
            let mut buf = [0u8; 32];
            buf[..protocol_name.len()].copy_from_slice(protocol_name);
            buf
        } else {
            Sha256::digest(protocol_name).into()
        };
        let mut state = SymmetricState { ck: h, h, k: None };
        state.mix_hash(prologue);
        state
    }

    fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    fn mix_key(&mut self, ikm: &[u8]) {
        let hk = Hkdf::<Sha256>::new(Some(&self.ck), ikm);
        let mut okm = [0u8; 64];
        hk.expand(&[], &mut okm).expect("64 <= 255*32");
        self.ck.copy_from_slice(&okm[..32]);
        let mut k = [0u8; 32];
        k.copy_from_slice(&okm[32..]);
        self.k = Some(k);
    }

    fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> NetResult<Vec<u8>> {
        let ciphertext = match self.k {
            None => plaintext.to_vec(),
            Some(k) => {
                let cipher = ChaCha20Poly1305::new(Key::from_slice(&k));
                cipher
                    .encrypt(Nonce::from_slice(&[0u8; 12]), Payload { msg: plaintext, aad: &self.h })
                    .map_err(|_| TransportError::AuthError)?
            }
        };
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> NetResult<Vec<u8>> {
        let plaintext = match self.k {
            None => ciphertext.to_vec(),
            Some(k) => {
                let cipher = ChaCha20Poly1305::new(Key::from_slice(&k));
                cipher
                    .decrypt(Nonce::from_slice(&[0u8; 12]), Payload { msg: ciphertext, aad: &self.h })
                    .map_err(|_| HandshakeError::MacMismatch)?
            }
        };
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    fn split(&self) -> ([u8; 32], [u8; 32]) {
        let hk = Hkdf::<Sha256>::new(Some(&self.ck), &[]);
        let mut okm = [0u8; 64];
        hk.expand(&[], &mut okm).expect("64 <= 255*32");
        let mut k1 = [0u8; 32];
        let mut k2 = [0u8; 32];
        k1.copy_from_slice(&okm[..32]);
        k2.copy_from_slice(&okm[32..]);
        (k1, k2)
    }
}

enum Role {
    Initiator,
    Responder,
}

/// Drives the three-act Noise-XK handshake to completion. The caller owns
/// the socket and is responsible for reading/writing exactly
/// `NOISE_ACT_*_SIZE` bytes per act, in the order the state machine expects
/// (`read_act_one`/`write_act_two` for the responder; `write_act_one`/
/// `read_act_two`/`write_act_three` for the initiator).
pub struct HandshakeState {
    role: Role,
    symmetric: SymmetricState,
    local_static: SecretKey,
    local_ephemeral: Option<SecretKey>,
    remote_static: Option<PublicKey>,
    remote_ephemeral: Option<PublicKey>,
}

impl HandshakeState {
    pub fn new_initiator(local_static: SecretKey, remote_static: PublicKey) -> HandshakeState {
        let mut symmetric = SymmetricState::initialize(NOISE_PROTOCOL_NAME, NOISE_PROLOGUE);
        symmetric.mix_hash(&x_coord(&remote_static));
        HandshakeState {
            role: Role::Initiator,
            symmetric,
            local_static,
            local_ephemeral: None,
            remote_static: Some(remote_static),
            remote_ephemeral: None,
        }
    }

    pub fn new_responder(local_static: SecretKey) -> HandshakeState {
        let secp = Secp256k1::signing_only();
        let local_pub = PublicKey::from_secret_key(&secp, &local_static);
        let mut symmetric = SymmetricState::initialize(NOISE_PROTOCOL_NAME, NOISE_PROLOGUE);
        symmetric.mix_hash(&x_coord(&local_pub));
        HandshakeState {
            role: Role::Responder,
            symmetric,
            local_static,
            local_ephemeral: None,
            remote_static: None,
            remote_ephemeral: None,
        }
    }

    pub fn write_act_one(
        &mut self,
        secp: &Secp256k1<impl Signing>,
        rng: &mut impl RngCore,
    ) -> NetResult<[u8; NOISE_ACT_ONE_SIZE]> {
        let e = SecretKey::new(rng);
        let e_pub = PublicKey::from_secret_key(secp, &e);
        self.symmetric.mix_hash(&x_coord(&e_pub));

        let remote_static = self.remote_static.expect("initiator knows remote static");
        let es = SharedSecret::new(&remote_static, &e);
        self.symmetric.mix_key(es.as_ref());
        let mac = self.symmetric.encrypt_and_hash(&[])?;

        self.local_ephemeral = Some(e);
        let mut out = [0u8; NOISE_ACT_ONE_SIZE];
        out[..UNIFORM_POINT_LEN].copy_from_slice(&encode_point(&e_pub, rng));
        out[UNIFORM_POINT_LEN..].copy_from_slice(&mac);
        Ok(out)
    }

    pub fn read_act_one(&mut self, buf: &[u8]) -> NetResult<()> {
        if buf.len() != NOISE_ACT_ONE_SIZE {
            return Err(HandshakeError::WrongActSize { expected: NOISE_ACT_ONE_SIZE, got: buf.len() }.into());
        }
        let e_pub = decode_point(&buf[..UNIFORM_POINT_LEN])?;
        self.symmetric.mix_hash(&x_coord(&e_pub));

        let es = SharedSecret::new(&e_pub, &self.local_static);
        self.symmetric.mix_key(es.as_ref());
        self.symmetric.decrypt_and_hash(&buf[UNIFORM_POINT_LEN..])?;

        self.remote_ephemeral = Some(e_pub);
        Ok(())
    }

    pub fn write_act_two(
        &mut self,
        secp: &Secp256k1<impl Signing>,
        rng: &mut impl RngCore,
    ) -> NetResult<[u8; NOISE_ACT_TWO_SIZE]> {
        let e = SecretKey::new(rng);
        let e_pub = PublicKey::from_secret_key(secp, &e);
        self.symmetric.mix_hash(&x_coord(&e_pub));

        let remote_ephemeral = self.remote_ephemeral.expect("act one already read");
        let ee = SharedSecret::new(&remote_ephemeral, &e);
        self.symmetric.mix_key(ee.as_ref());
        let mac = self.symmetric.encrypt_and_hash(&[])?;

        self.local_ephemeral = Some(e);
        let mut out = [0u8; NOISE_ACT_TWO_SIZE];
        out[..UNIFORM_POINT_LEN].copy_from_slice(&encode_point(&e_pub, rng));
        out[UNIFORM_POINT_LEN..].copy_from_slice(&mac);
        Ok(out)
    }

    pub fn read_act_two(&mut self, buf: &[u8]) -> NetResult<()> {
        if buf.len() != NOISE_ACT_TWO_SIZE {
            return Err(HandshakeError::WrongActSize { expected: NOISE_ACT_TWO_SIZE, got: buf.len() }.into());
        }
        let e_pub = decode_point(&buf[..UNIFORM_POINT_LEN])?;
        self.symmetric.mix_hash(&x_coord(&e_pub));

        let local_ephemeral = self.local_ephemeral.as_ref().expect("act one already written");
        let ee = SharedSecret::new(&e_pub, local_ephemeral);
        self.symmetric.mix_key(ee.as_ref());
        self.symmetric.decrypt_and_hash(&buf[UNIFORM_POINT_LEN..])?;

        self.remote_ephemeral = Some(e_pub);
        Ok(())
    }

    pub fn write_act_three(
        &mut self,
        secp: &Secp256k1<impl Signing>,
    ) -> NetResult<[u8; NOISE_ACT_THREE_SIZE]> {
        let local_pub = PublicKey::from_secret_key(secp, &self.local_static);
        let ciphertext1 = self.symmetric.encrypt_and_hash(&local_pub.serialize())?;

        let remote_ephemeral = self.remote_ephemeral.expect("act two already read");
        let se = SharedSecret::new(&remote_ephemeral, &self.local_static);
        self.symmetric.mix_key(se.as_ref());
        let mac2 = self.symmetric.encrypt_and_hash(&[])?;

        let mut out = [0u8; NOISE_ACT_THREE_SIZE];
        out[..ciphertext1.len()].copy_from_slice(&ciphertext1);
        out[ciphertext1.len()..].copy_from_slice(&mac2);
        Ok(out)
    }

    /// Reads act three and returns the remote peer's static public key, now
    /// authenticated.
    pub fn read_act_three_from(&mut self, buf: &[u8]) -> NetResult<PublicKey> {
        if buf.len() != NOISE_ACT_THREE_SIZE {
            return Err(HandshakeError::WrongActSize { expected: NOISE_ACT_THREE_SIZE, got: buf.len() }.into());
        }
        let ciphertext1_len = 33 + TAG_LEN;
        let plaintext = self.symmetric.decrypt_and_hash(&buf[..ciphertext1_len])?;
        let remote_static = PublicKey::from_slice(&plaintext).map_err(|_| HandshakeError::BadPointDecode)?;

        let local_ephemeral = self.local_ephemeral.as_ref().expect("act two already written");
        let se = SharedSecret::new(&remote_static, local_ephemeral);
        self.symmetric.mix_key(se.as_ref());
        self.symmetric.decrypt_and_hash(&buf[ciphertext1_len..])?;

        self.remote_static = Some(remote_static);
        Ok(remote_static)
    }

    /// Consumes the handshake state and derives the pair of transport
    /// ciphers. Matches `Role::Initiator` to (send, recv) = (c1, c2) and
    /// `Role::Responder` to (send, recv) = (c2, c1), per Noise's `Split()`.
    pub fn finish(self) -> (CipherState, CipherState) {
        let (c1, c2) = self.symmetric.split();
        match self.role {
            Role::Initiator => (CipherState::new(c1), CipherState::new(c2)),
            Role::Responder => (CipherState::new(c2), CipherState::new(c1)),
        }
    }

    pub fn remote_static(&self) -> Option<PublicKey> {
        self.remote_static
    }
}

/// One direction of the post-handshake transport cipher: a nonce counter
/// plus a key that rotates every `NOISE_REKEY_INTERVAL` messages by
/// feeding the current key back into itself via HKDF, the same rotation
/// brontide-style transports use to bound key lifetime without a second
/// handshake.
pub struct CipherState {
    key: [u8; 32],
    nonce: u64,
    since_rekey: u32,
}

impl CipherState {
    fn new(key: [u8; 32]) -> CipherState {
        CipherState { key, nonce: 0, since_rekey: 0 }
    }

    fn rekey(&mut self) {
        let hk = Hkdf::<Sha256>::new(None, &self.key);
        let mut okm = [0u8; 32];
        hk.expand(b"rekey", &mut okm).expect("32 <= 255*32");
        self.key = okm;
        self.since_rekey = 0;
    }

    fn next_nonce(&mut self) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[4..].copy_from_slice(&self.nonce.to_le_bytes());
        self.nonce += 1;
        self.since_rekey += 1;
        if self.since_rekey >= NOISE_REKEY_INTERVAL {
            self.rekey();
            self.nonce = 0;
        }
        nonce
    }

    pub fn seal(&mut self, plaintext: &[u8]) -> NetResult<Vec<u8>> {
        if plaintext.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::Oversize(plaintext.len()).into());
        }
        let nonce = self.next_nonce();
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| TransportError::AuthError.into())
    }

    pub fn open(&mut self, ciphertext: &[u8]) -> NetResult<Vec<u8>> {
        if ciphertext.len() > MAX_MESSAGE_SIZE + TAG_LEN {
            return Err(TransportError::Oversize(ciphertext.len()).into());
        }
        let nonce = self.next_nonce();
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| TransportError::AuthError.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn full_handshake_establishes_matching_transport_keys() {
        let secp = Secp256k1::new();
        let mut rng = OsRng;

        let init_static = SecretKey::new(&mut rng);
        let resp_static = SecretKey::new(&mut rng);
        let resp_pub = PublicKey::from_secret_key(&secp, &resp_static);

        let mut initiator = HandshakeState::new_initiator(init_static, resp_pub);
        let mut responder = HandshakeState::new_responder(resp_static);

        let act1 = initiator.write_act_one(&secp, &mut rng).unwrap();
        responder.read_act_one(&act1).unwrap();

        let act2 = responder.write_act_two(&secp, &mut rng).unwrap();
        initiator.read_act_two(&act2).unwrap();

        let act3 = initiator.write_act_three(&secp).unwrap();
        let remote_static_seen_by_responder = responder.read_act_three_from(&act3).unwrap();

        let init_pub = PublicKey::from_secret_key(&secp, &init_static);
        assert_eq!(remote_static_seen_by_responder, init_pub);

        let (mut init_send, mut init_recv) = initiator.finish();
        let (mut resp_send, mut resp_recv) = responder.finish();

        let msg = b"hello over brontide-style transport";
        let sealed = init_send.seal(msg).unwrap();
        let opened = resp_recv.open(&sealed).unwrap();
        assert_eq!(&opened[..], msg);

        let reply = b"hi back";
        let sealed_reply = resp_send.seal(reply).unwrap();
        let opened_reply = init_recv.open(&sealed_reply).unwrap();
        assert_eq!(&opened_reply[..], reply);
    }

    #[test]
    fn tampered_transport_frame_fails_to_open() {
        let secp = Secp256k1::new();
        let mut rng = OsRng;
        let init_static = SecretKey::new(&mut rng);
        let resp_static = SecretKey::new(&mut rng);
        let resp_pub = PublicKey::from_secret_key(&secp, &resp_static);

        let mut initiator = HandshakeState::new_initiator(init_static, resp_pub);
        let mut responder = HandshakeState::new_responder(resp_static);
        let act1 = initiator.write_act_one(&secp, &mut rng).unwrap();
        responder.read_act_one(&act1).unwrap();
        let act2 = responder.write_act_two(&secp, &mut rng).unwrap();
        initiator.read_act_two(&act2).unwrap();
        let act3 = initiator.write_act_three(&secp).unwrap();
        responder.read_act_three_from(&act3).unwrap();

        let (mut init_send, _) = initiator.finish();
        let (_, mut resp_recv) = responder.finish();

        let mut sealed = init_send.seal(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(resp_recv.open(&sealed).is_err());
    }

    #[test]
    fn wrong_act_size_is_rejected() {
        let mut responder = HandshakeState::new_responder(SecretKey::new(&mut OsRng));
        let err = responder.read_act_one(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, crate::error::NetworkError::Transport(_)));
    }
}
