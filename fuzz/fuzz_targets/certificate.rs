#![no_main]

use libfuzzer_sys::fuzz_target;
use certscope::x509::{Certificate, Crl};

fuzz_target!(|data: &[u8]| {
    if let Ok(cert) = Certificate::from_mem(data.to_vec()) {
        let _ = cert.hash();
        let _ = cert.public_key();
        let _ = cert.is_self_signed();
    }
    let _ = Crl::from_der(data);
});
