#![no_main]

use libfuzzer_sys::fuzz_target;
use certscope::crypto::asymmetric::blob::KeyBlob;

fuzz_target!(|data: &[u8]| {
    let _ = KeyBlob::decode(data);
    let _ = KeyBlob::from_pvk(data);
});
