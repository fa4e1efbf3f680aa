//! Raw mDNS payload builder for tests. Names are written uncompressed and
//! labels are copied byte for byte, so UTF-8 labels go on the wire as is.

use std::net::{Ipv4Addr, Ipv6Addr};

const TYPE_A: u16 = 1;
const TYPE_PTR: u16 = 12;
const TYPE_TXT: u16 = 16;
const TYPE_AAAA: u16 = 28;
const TYPE_SRV: u16 = 33;
const TYPE_HINFO: u16 = 13;

/// IN class with the mDNS cache-flush bit set
const CLASS_IN_FLUSH: u16 = 0x8001;
const CLASS_IN: u16 = 0x0001;

pub struct PacketBuilder {
    flags: u16,
    questions: Vec<Vec<u8>>,
    answers: Vec<Vec<u8>>,
    authority: Vec<Vec<u8>>,
    additional: Vec<Vec<u8>>,
}

impl PacketBuilder {
    pub fn response() -> Self {
        Self::with_flags(0x8400)
    }

    pub fn query() -> Self {
        Self::with_flags(0x0000)
    }

    fn with_flags(flags: u16) -> Self {
        Self {
            flags,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn question_ptr(mut self, name: &str) -> Self {
        let mut q = encode_name(name);
        q.extend_from_slice(&TYPE_PTR.to_be_bytes());
        q.extend_from_slice(&CLASS_IN.to_be_bytes());
        self.questions.push(q);
        self
    }

    pub fn ptr(mut self, owner: &str, target: &str) -> Self {
        self.answers.push(encode_record(owner, TYPE_PTR, &encode_name(target)));
        self
    }

    pub fn srv(mut self, owner: &str, target: &str, port: u16) -> Self {
        self.answers.push(encode_record(owner, TYPE_SRV, &srv_rdata(target, port)));
        self
    }

    pub fn additional_srv(mut self, owner: &str, target: &str, port: u16) -> Self {
        self.additional.push(encode_record(owner, TYPE_SRV, &srv_rdata(target, port)));
        self
    }

    pub fn txt(mut self, owner: &str, strings: &[&str]) -> Self {
        let mut rdata = Vec::new();
        for s in strings {
            rdata.push(s.len() as u8);
            rdata.extend_from_slice(s.as_bytes());
        }
        self.answers.push(encode_record(owner, TYPE_TXT, &rdata));
        self
    }

    pub fn a(mut self, owner: &str, addr: Ipv4Addr) -> Self {
        self.answers.push(encode_record(owner, TYPE_A, &addr.octets()));
        self
    }

    pub fn authority_a(mut self, owner: &str, addr: Ipv4Addr) -> Self {
        self.authority.push(encode_record(owner, TYPE_A, &addr.octets()));
        self
    }

    pub fn aaaa(mut self, owner: &str, addr: Ipv6Addr) -> Self {
        self.answers.push(encode_record(owner, TYPE_AAAA, &addr.octets()));
        self
    }

    /// An HINFO record, which the observer does not care about.
    pub fn hinfo(mut self, owner: &str) -> Self {
        let rdata = [3, b'A', b'R', b'M', 5, b'L', b'i', b'n', b'u', b'x'];
        self.answers.push(encode_record(owner, TYPE_HINFO, &rdata));
        self
    }

    /// A record of any type code with caller-supplied rdata.
    pub fn record(mut self, owner: &str, rtype: u16, rdata: &[u8]) -> Self {
        self.answers.push(encode_record(owner, rtype, rdata));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        for section in [&self.questions, &self.answers, &self.authority, &self.additional] {
            out.extend_from_slice(&(section.len() as u16).to_be_bytes());
        }
        for section in [self.questions, self.answers, self.authority, self.additional] {
            for entry in section {
                out.extend_from_slice(&entry);
            }
        }
        out
    }
}

fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for label in name.trim_end_matches('.').split('.').filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out
}

fn srv_rdata(target: &str, port: u16) -> Vec<u8> {
    let mut rdata = Vec::new();
    rdata.extend_from_slice(&0u16.to_be_bytes());
    rdata.extend_from_slice(&0u16.to_be_bytes());
    rdata.extend_from_slice(&port.to_be_bytes());
    rdata.extend_from_slice(&encode_name(target));
    rdata
}

fn encode_record(owner: &str, rtype: u16, rdata: &[u8]) -> Vec<u8> {
    let mut out = encode_name(owner);
    out.extend_from_slice(&rtype.to_be_bytes());
    out.extend_from_slice(&CLASS_IN_FLUSH.to_be_bytes());
    out.extend_from_slice(&120u32.to_be_bytes());
    out.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    out.extend_from_slice(rdata);
    out
}
