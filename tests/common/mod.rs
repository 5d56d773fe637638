//! Shared frame builders for the integration tests.

use sbf_rx::checksum::checksum;

/// Full binary block: sync, id, length, payload, trailing checksum.
pub fn block(id: u16, payload: &[u8]) -> Vec<u8> {
    let length = 6 + payload.len() + 2;
    assert_eq!(length % 4, 0, "block length must be a multiple of 4");
    let mut dat = vec![b'$', b'@'];
    dat.extend_from_slice(&id.to_le_bytes());
    dat.extend_from_slice(&u16::try_from(length).unwrap().to_le_bytes());
    dat.extend_from_slice(payload);
    dat.extend_from_slice(&checksum(&dat).to_le_bytes());
    dat
}

pub fn pvt_geodetic(tow: u32, latitude: f64, longitude: f64, height: f64) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&tow.to_le_bytes());
    p.extend_from_slice(&2310u16.to_le_bytes());
    p.push(4); // mode: rtk fixed
    p.push(0); // error
    p.extend_from_slice(&latitude.to_le_bytes());
    p.extend_from_slice(&longitude.to_le_bytes());
    p.extend_from_slice(&height.to_le_bytes());
    p.push(12); // nr_sv
    p.extend_from_slice(&[0u8; 3]);
    block(sbf_rx::records::PvtGeodetic::ID, &p)
}

pub fn pos_cov_geodetic(tow: u32, cov: [f32; 3]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&tow.to_le_bytes());
    p.extend_from_slice(&2310u16.to_le_bytes());
    p.push(4);
    p.push(0);
    for c in cov {
        p.extend_from_slice(&c.to_le_bytes());
    }
    block(sbf_rx::records::PosCovGeodetic::ID, &p)
}

pub fn att_euler(tow: u32, heading: f32, pitch: f32, roll: f32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&tow.to_le_bytes());
    p.extend_from_slice(&2310u16.to_le_bytes());
    p.push(3); // nr_sv
    p.push(0); // error
    p.extend_from_slice(&heading.to_le_bytes());
    p.extend_from_slice(&pitch.to_le_bytes());
    p.extend_from_slice(&roll.to_le_bytes());
    block(sbf_rx::records::AttEuler::ID, &p)
}

/// Sentence line with a correct `*hh` checksum and CRLF terminator.
pub fn sentence(body: &str) -> Vec<u8> {
    let sum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${body}*{sum:02X}\r\n").into_bytes()
}
