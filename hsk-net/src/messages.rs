//! Packet payload types for the taxonomy in `hsk_core::PacketType` (spec
//! §4.4). `Block`, `Tx`, `MerkleBlock`, `Claim`, `Airdrop`, `Proof` and the
//! header/transaction blobs nested inside compact-block messages are kept
//! as opaque byte blobs: consensus encoding is out of scope here, and the
//! pool only ever needs to hash, store, and relay them unopened.

use crate::error::{NetworkError, Result};
use byteorder::{ByteOrder, LittleEndian};
use hsk_core::{Hash, InvItem, InvType, NetAddress, Services};
use std::net::{IpAddr, Ipv6Addr};

fn malformed(msg: impl Into<String>) -> NetworkError {
    NetworkError::Malformed(msg.into())
}

/// A cursor over an immutable payload buffer. Mirrors the teacher's
/// `Rlp`-style decoder: every read can fail with a single `Malformed`
/// variant rather than panicking on short input.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Reader<'a> {
        Reader { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(malformed("unexpected end of payload"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    fn hash(&mut self) -> Result<Hash> {
        Ok(Hash::from_slice(self.take(32)?).ok_or_else(|| malformed("bad hash length"))?)
    }

    fn varint(&mut self) -> Result<u64> {
        let first = self.u8()?;
        Ok(match first {
            0xfd => self.u16()? as u64,
            0xfe => self.u32()? as u64,
            0xff => self.u64()?,
            n => n as u64,
        })
    }

    fn var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.varint()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn var_string(&mut self) -> Result<String> {
        let bytes = self.var_bytes()?;
        String::from_utf8(bytes).map_err(|_| malformed("user agent is not valid utf-8"))
    }

    fn net_address(&mut self) -> Result<NetAddress> {
        let mut raw_ip = [0u8; 16];
        raw_ip.copy_from_slice(self.take(16)?);
        let port = self.u16()?;
        let services = Services::from_bits_truncate(self.u32()?);
        let time = self.u32()?;
        let mut identity_key = [0u8; 33];
        identity_key.copy_from_slice(self.take(33)?);
        let ip = IpAddr::from(Ipv6Addr::from(raw_ip));
        let mut addr = NetAddress::new(ip, port);
        addr.services = services;
        addr.time = time;
        addr.identity_key = identity_key;
        Ok(addr)
    }

    fn inv_item(&mut self) -> Result<InvItem> {
        let kind = match self.u32()? {
            0 => InvType::Block,
            1 => InvType::Tx,
            2 => InvType::Claim,
            3 => InvType::Airdrop,
            4 => InvType::FilteredBlock,
            5 => InvType::CompactBlock,
            n => return Err(malformed(format!("unknown inv type {n}"))),
        };
        let hash = self.hash()?;
        Ok(InvItem { kind, hash })
    }

    fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(malformed("trailing bytes after payload"));
        }
        Ok(())
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Writer {
        Writer { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) -> &mut Writer {
        self.buf.push(v);
        self
    }

    fn u16(&mut self, v: u16) -> &mut Writer {
        let mut tmp = [0u8; 2];
        LittleEndian::write_u16(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    fn u32(&mut self, v: u32) -> &mut Writer {
        let mut tmp = [0u8; 4];
        LittleEndian::write_u32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    fn u64(&mut self, v: u64) -> &mut Writer {
        let mut tmp = [0u8; 8];
        LittleEndian::write_u64(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    fn hash(&mut self, h: &Hash) -> &mut Writer {
        self.buf.extend_from_slice(h.as_bytes());
        self
    }

    fn varint(&mut self, v: u64) -> &mut Writer {
        if v < 0xfd {
            self.u8(v as u8);
        } else if v <= 0xffff {
            self.u8(0xfd).u16(v as u16);
        } else if v <= 0xffff_ffff {
            self.u8(0xfe).u32(v as u32);
        } else {
            self.u8(0xff).u64(v);
        }
        self
    }

    fn var_bytes(&mut self, data: &[u8]) -> &mut Writer {
        self.varint(data.len() as u64);
        self.buf.extend_from_slice(data);
        self
    }

    fn var_string(&mut self, s: &str) -> &mut Writer {
        self.var_bytes(s.as_bytes());
        self
    }

    fn net_address(&mut self, addr: &NetAddress) -> &mut Writer {
        self.buf.extend_from_slice(&addr.raw_ip);
        self.u16(addr.port);
        self.u32(addr.services.bits());
        self.u32(addr.time);
        self.buf.extend_from_slice(&addr.identity_key);
        self
    }

    fn inv_item(&mut self, item: &InvItem) -> &mut Writer {
        let kind = match item.kind {
            InvType::Block => 0u32,
            InvType::Tx => 1,
            InvType::Claim => 2,
            InvType::Airdrop => 3,
            InvType::FilteredBlock => 4,
            InvType::CompactBlock => 5,
        };
        self.u32(kind);
        self.hash(&item.hash);
        self
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone)]
pub struct VersionPayload {
    pub version: u32,
    pub services: Services,
    pub time: u64,
    pub remote: NetAddress,
    pub nonce: u64,
    pub agent: String,
    pub height: u32,
    pub no_relay: bool,
}

impl VersionPayload {
    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u32(self.version);
        w.u32(self.services.bits());
        w.u64(self.time);
        w.net_address(&self.remote);
        w.u64(self.nonce);
        w.var_string(&self.agent);
        w.u32(self.height);
        w.u8(self.no_relay as u8);
        w.finish()
    }

    fn decode(buf: &[u8]) -> Result<VersionPayload> {
        let mut r = Reader::new(buf);
        let version = r.u32()?;
        let services = Services::from_bits_truncate(r.u32()?);
        let time = r.u64()?;
        let remote = r.net_address()?;
        let nonce = r.u64()?;
        let agent = r.var_string()?;
        let height = r.u32()?;
        let no_relay = r.u8()? != 0;
        r.finish()?;
        Ok(VersionPayload { version, services, time, remote, nonce, agent, height, no_relay })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PingPongPayload {
    pub nonce: u64,
}

#[derive(Debug, Clone)]
pub struct AddrPayload {
    pub addrs: Vec<NetAddress>,
}

#[derive(Debug, Clone)]
pub struct InvPayload {
    pub items: Vec<InvItem>,
}

#[derive(Debug, Clone)]
pub struct GetBlocksPayload {
    pub locator: Vec<Hash>,
    pub stop: Hash,
}

#[derive(Debug, Clone)]
pub struct HeadersPayload {
    pub headers: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct RejectPayload {
    pub message: String,
    pub code: u8,
    pub reason: String,
    pub data: Hash,
}

#[derive(Debug, Clone)]
pub struct FilterLoadPayload {
    pub filter: Vec<u8>,
    pub hash_funcs: u32,
    pub tweak: u32,
    pub flags: u8,
}

#[derive(Debug, Clone)]
pub struct FilterAddPayload {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct FeeFilterPayload {
    pub rate: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SendCmpctPayload {
    pub enable: bool,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct CmpctBlockPayload {
    pub header: Vec<u8>,
    pub nonce: u64,
    pub short_ids: Vec<u64>,
    pub prefilled: Vec<(u32, Vec<u8>)>,
}

#[derive(Debug, Clone)]
pub struct GetBlockTxnPayload {
    pub block_hash: Hash,
    pub indexes: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct BlockTxnPayload {
    pub block_hash: Hash,
    pub txs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct GetProofPayload {
    pub key: Hash,
    pub root: Hash,
}

#[derive(Debug, Clone)]
pub struct ProofPayload {
    pub nodes: Vec<Vec<u8>>,
}

/// A decoded packet payload. `Block`/`Tx`/`MerkleBlock`/`Claim`/`Airdrop`
/// stay as raw bytes; everything that touches peer-management state is
/// fully typed.
#[derive(Debug, Clone)]
pub enum Payload {
    Version(VersionPayload),
    Verack,
    Ping(PingPongPayload),
    Pong(PingPongPayload),
    GetAddr,
    Addr(AddrPayload),
    Inv(InvPayload),
    GetData(InvPayload),
    NotFound(InvPayload),
    GetBlocks(GetBlocksPayload),
    GetHeaders(GetBlocksPayload),
    Headers(HeadersPayload),
    SendHeaders,
    Block(Vec<u8>),
    Tx(Vec<u8>),
    Reject(RejectPayload),
    Mempool,
    FilterLoad(FilterLoadPayload),
    FilterAdd(FilterAddPayload),
    FilterClear,
    MerkleBlock(Vec<u8>),
    FeeFilter(FeeFilterPayload),
    SendCmpct(SendCmpctPayload),
    CmpctBlock(CmpctBlockPayload),
    GetBlockTxn(GetBlockTxnPayload),
    BlockTxn(BlockTxnPayload),
    GetProof(GetProofPayload),
    Proof(ProofPayload),
    Claim(Vec<u8>),
    Airdrop(Vec<u8>),
}

fn decode_inv_list(buf: &[u8]) -> Result<InvPayload> {
    let mut r = Reader::new(buf);
    let count = r.varint()?;
    let mut items = Vec::with_capacity(count.min(hsk_core::constants::MAX_INV_ITEMS as u64) as usize);
    for _ in 0..count {
        items.push(r.inv_item()?);
    }
    r.finish()?;
    Ok(InvPayload { items })
}

fn encode_inv_list(items: &[InvItem]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(items.len() as u64);
    for item in items {
        w.inv_item(item);
    }
    w.finish()
}

fn decode_locator(buf: &[u8]) -> Result<GetBlocksPayload> {
    let mut r = Reader::new(buf);
    let count = r.varint()?;
    let mut locator = Vec::with_capacity(count as usize);
    for _ in 0..count {
        locator.push(r.hash()?);
    }
    let stop = r.hash()?;
    r.finish()?;
    Ok(GetBlocksPayload { locator, stop })
}

fn encode_locator(p: &GetBlocksPayload) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(p.locator.len() as u64);
    for h in &p.locator {
        w.hash(h);
    }
    w.hash(&p.stop);
    w.finish()
}

fn decode_blob_list(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut r = Reader::new(buf);
    let count = r.varint()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(r.var_bytes()?);
    }
    r.finish()?;
    Ok(out)
}

fn encode_blob_list(blobs: &[Vec<u8>]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(blobs.len() as u64);
    for blob in blobs {
        w.var_bytes(blob);
    }
    w.finish()
}

impl Payload {
    pub fn packet_type(&self) -> hsk_core::PacketType {
        use hsk_core::PacketType::*;
        match self {
            Payload::Version(_) => Version,
            Payload::Verack => Verack,
            Payload::Ping(_) => Ping,
            Payload::Pong(_) => Pong,
            Payload::GetAddr => GetAddr,
            Payload::Addr(_) => Addr,
            Payload::Inv(_) => Inv,
            Payload::GetData(_) => GetData,
            Payload::NotFound(_) => NotFound,
            Payload::GetBlocks(_) => GetBlocks,
            Payload::GetHeaders(_) => GetHeaders,
            Payload::Headers(_) => Headers,
            Payload::SendHeaders => SendHeaders,
            Payload::Block(_) => Block,
            Payload::Tx(_) => Tx,
            Payload::Reject(_) => Reject,
            Payload::Mempool => Mempool,
            Payload::FilterLoad(_) => FilterLoad,
            Payload::FilterAdd(_) => FilterAdd,
            Payload::FilterClear => FilterClear,
            Payload::MerkleBlock(_) => MerkleBlock,
            Payload::FeeFilter(_) => FeeFilter,
            Payload::SendCmpct(_) => SendCmpct,
            Payload::CmpctBlock(_) => CmpctBlock,
            Payload::GetBlockTxn(_) => GetBlockTxn,
            Payload::BlockTxn(_) => BlockTxn,
            Payload::GetProof(_) => GetProof,
            Payload::Proof(_) => Proof,
            Payload::Claim(_) => Claim,
            Payload::Airdrop(_) => Airdrop,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Payload::Version(p) => p.encode(),
            Payload::Verack
            | Payload::GetAddr
            | Payload::SendHeaders
            | Payload::Mempool
            | Payload::FilterClear => Vec::new(),
            Payload::Ping(p) | Payload::Pong(p) => p.nonce.to_le_bytes().to_vec(),
            Payload::Addr(p) => {
                let mut w = Writer::new();
                w.varint(p.addrs.len() as u64);
                for a in &p.addrs {
                    w.net_address(a);
                }
                w.finish()
            }
            Payload::Inv(p) | Payload::GetData(p) | Payload::NotFound(p) => encode_inv_list(&p.items),
            Payload::GetBlocks(p) | Payload::GetHeaders(p) => encode_locator(p),
            Payload::Headers(p) => encode_blob_list(&p.headers),
            Payload::Block(b) | Payload::Tx(b) | Payload::MerkleBlock(b) | Payload::Claim(b) | Payload::Airdrop(b) => {
                b.clone()
            }
            Payload::Reject(p) => {
                let mut w = Writer::new();
                w.var_string(&p.message);
                w.u8(p.code);
                w.var_string(&p.reason);
                w.hash(&p.data);
                w.finish()
            }
            Payload::FilterLoad(p) => {
                let mut w = Writer::new();
                w.var_bytes(&p.filter);
                w.u32(p.hash_funcs);
                w.u32(p.tweak);
                w.u8(p.flags);
                w.finish()
            }
            Payload::FilterAdd(p) => {
                let mut w = Writer::new();
                w.var_bytes(&p.data);
                w.finish()
            }
            Payload::FeeFilter(p) => p.rate.to_le_bytes().to_vec(),
            Payload::SendCmpct(p) => {
                let mut w = Writer::new();
                w.u8(p.enable as u8);
                w.u64(p.version);
                w.finish()
            }
            Payload::CmpctBlock(p) => {
                let mut w = Writer::new();
                w.var_bytes(&p.header);
                w.u64(p.nonce);
                w.varint(p.short_ids.len() as u64);
                for id in &p.short_ids {
                    w.buf.extend_from_slice(&id.to_le_bytes()[..6]);
                }
                w.varint(p.prefilled.len() as u64);
                for (index, tx) in &p.prefilled {
                    w.varint(*index as u64);
                    w.var_bytes(tx);
                }
                w.finish()
            }
            Payload::GetBlockTxn(p) => {
                let mut w = Writer::new();
                w.hash(&p.block_hash);
                w.varint(p.indexes.len() as u64);
                for idx in &p.indexes {
                    w.varint(*idx as u64);
                }
                w.finish()
            }
            Payload::BlockTxn(p) => {
                let mut w = Writer::new();
                w.hash(&p.block_hash);
                w.buf.extend_from_slice(&encode_blob_list(&p.txs));
                w.finish()
            }
            Payload::GetProof(p) => {
                let mut w = Writer::new();
                w.hash(&p.key);
                w.hash(&p.root);
                w.finish()
            }
            Payload::Proof(p) => encode_blob_list(&p.nodes),
        }
    }

    pub fn decode(ty: hsk_core::PacketType, buf: &[u8]) -> Result<Payload> {
        use hsk_core::PacketType::*;
        Ok(match ty {
            Version => Payload::Version(VersionPayload::decode(buf)?),
            Verack => {
                expect_empty(buf)?;
                Payload::Verack
            }
            Ping => Payload::Ping(decode_ping_pong(buf)?),
            Pong => Payload::Pong(decode_ping_pong(buf)?),
            GetAddr => {
                expect_empty(buf)?;
                Payload::GetAddr
            }
            Addr => {
                let mut r = Reader::new(buf);
                let count = r.varint()?;
                let mut addrs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    addrs.push(r.net_address()?);
                }
                r.finish()?;
                Payload::Addr(AddrPayload { addrs })
            }
            Inv => Payload::Inv(decode_inv_list(buf)?),
            GetData => Payload::GetData(decode_inv_list(buf)?),
            NotFound => Payload::NotFound(decode_inv_list(buf)?),
            GetBlocks => Payload::GetBlocks(decode_locator(buf)?),
            GetHeaders => Payload::GetHeaders(decode_locator(buf)?),
            Headers => Payload::Headers(HeadersPayload { headers: decode_blob_list(buf)? }),
            SendHeaders => {
                expect_empty(buf)?;
                Payload::SendHeaders
            }
            Block => Payload::Block(buf.to_vec()),
            Tx => Payload::Tx(buf.to_vec()),
            Reject => {
                let mut r = Reader::new(buf);
                let message = r.var_string()?;
                let code = r.u8()?;
                let reason = r.var_string()?;
                let data = r.hash()?;
                r.finish()?;
                Payload::Reject(RejectPayload { message, code, reason, data })
            }
            Mempool => {
                expect_empty(buf)?;
                Payload::Mempool
            }
            FilterLoad => {
                let mut r = Reader::new(buf);
                let filter = r.var_bytes()?;
                let hash_funcs = r.u32()?;
                let tweak = r.u32()?;
                let flags = r.u8()?;
                r.finish()?;
                Payload::FilterLoad(FilterLoadPayload { filter, hash_funcs, tweak, flags })
            }
            FilterAdd => {
                let mut r = Reader::new(buf);
                let data = r.var_bytes()?;
                r.finish()?;
                Payload::FilterAdd(FilterAddPayload { data })
            }
            FilterClear => {
                expect_empty(buf)?;
                Payload::FilterClear
            }
            MerkleBlock => Payload::MerkleBlock(buf.to_vec()),
            FeeFilter => {
                let mut r = Reader::new(buf);
                let rate = r.u64()?;
                r.finish()?;
                Payload::FeeFilter(FeeFilterPayload { rate })
            }
            SendCmpct => {
                let mut r = Reader::new(buf);
                let enable = r.u8()? != 0;
                let version = r.u64()?;
                r.finish()?;
                Payload::SendCmpct(SendCmpctPayload { enable, version })
            }
            CmpctBlock => {
                let mut r = Reader::new(buf);
                let header = r.var_bytes()?;
                let nonce = r.u64()?;
                let id_count = r.varint()?;
                let mut short_ids = Vec::with_capacity(id_count as usize);
                for _ in 0..id_count {
                    let mut tmp = [0u8; 8];
                    tmp[..6].copy_from_slice(r.take(6)?);
                    short_ids.push(u64::from_le_bytes(tmp));
                }
                let pf_count = r.varint()?;
                let mut prefilled = Vec::with_capacity(pf_count as usize);
                for _ in 0..pf_count {
                    let index = r.varint()? as u32;
                    let tx = r.var_bytes()?;
                    prefilled.push((index, tx));
                }
                r.finish()?;
                Payload::CmpctBlock(CmpctBlockPayload { header, nonce, short_ids, prefilled })
            }
            GetBlockTxn => {
                let mut r = Reader::new(buf);
                let block_hash = r.hash()?;
                let count = r.varint()?;
                let mut indexes = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    indexes.push(r.varint()? as u32);
                }
                r.finish()?;
                Payload::GetBlockTxn(GetBlockTxnPayload { block_hash, indexes })
            }
            BlockTxn => {
                let mut r = Reader::new(buf);
                let block_hash = r.hash()?;
                let rest = r.take(r.remaining())?;
                let txs = decode_blob_list(rest)?;
                Payload::BlockTxn(BlockTxnPayload { block_hash, txs })
            }
            GetProof => {
                let mut r = Reader::new(buf);
                let key = r.hash()?;
                let root = r.hash()?;
                r.finish()?;
                Payload::GetProof(GetProofPayload { key, root })
            }
            Proof => Payload::Proof(ProofPayload { nodes: decode_blob_list(buf)? }),
            Claim => Payload::Claim(buf.to_vec()),
            Airdrop => Payload::Airdrop(buf.to_vec()),
            Unknown => return Err(malformed("cannot decode an Unknown packet type")),
        })
    }
}

fn expect_empty(buf: &[u8]) -> Result<()> {
    if !buf.is_empty() {
        return Err(malformed("expected empty payload"));
    }
    Ok(())
}

fn decode_ping_pong(buf: &[u8]) -> Result<PingPongPayload> {
    let mut r = Reader::new(buf);
    let nonce = r.u64()?;
    r.finish()?;
    Ok(PingPongPayload { nonce })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn version_round_trips() {
        let remote = NetAddress::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 13038);
        let payload = Payload::Version(VersionPayload {
            version: 3,
            services: Services::NETWORK,
            time: 1_700_000_000,
            remote,
            nonce: 0xdead_beef_1234_5678,
            agent: "/hsknode:0.1.0/".into(),
            height: 100,
            no_relay: true,
        });
        let encoded = payload.encode();
        let decoded = Payload::decode(hsk_core::PacketType::Version, &encoded).unwrap();
        match decoded {
            Payload::Version(v) => {
                assert_eq!(v.version, 3);
                assert_eq!(v.agent, "/hsknode:0.1.0/");
                assert!(v.no_relay);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn ping_pong_round_trip() {
        let encoded = Payload::Ping(PingPongPayload { nonce: 42 }).encode();
        let decoded = Payload::decode(hsk_core::PacketType::Ping, &encoded).unwrap();
        match decoded {
            Payload::Ping(p) => assert_eq!(p.nonce, 42),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn inv_round_trips_and_rejects_unknown_type() {
        let items = vec![InvItem { kind: InvType::Block, hash: Hash::digest(b"a") }];
        let encoded = encode_inv_list(&items);
        let decoded = decode_inv_list(&encoded).unwrap();
        assert_eq!(decoded.items, items);

        let mut bad = encoded.clone();
        LittleEndian::write_u32(&mut bad[1..5], 99);
        assert!(decode_inv_list(&bad).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = Payload::Ping(PingPongPayload { nonce: 1 }).encode();
        encoded.push(0xff);
        assert!(Payload::decode(hsk_core::PacketType::Ping, &encoded).is_err());
    }

    #[test]
    fn verack_has_empty_payload() {
        assert!(Payload::Verack.encode().is_empty());
        assert!(Payload::decode(hsk_core::PacketType::Verack, &[]).is_ok());
        assert!(Payload::decode(hsk_core::PacketType::Verack, &[1]).is_err());
    }
}
