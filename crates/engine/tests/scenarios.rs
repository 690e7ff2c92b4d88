use std::fs;

use myfs_engine::{EngineError, Volume};
use myfs_types::DATA_PAYLOAD_PER_BLOCK;
use tempfile::tempdir;

fn fresh_volume() -> (tempfile::TempDir, Volume) {
    let dir = tempdir().unwrap();
    let volume = Volume::open(dir.path().join("MyFS.dat"), dir.path().join("metadata.dat"), None).unwrap();
    (dir, volume)
}

#[test_log::test]
fn scenario_1_init_add_list_export() {
    let (dir, vol) = fresh_volume();
    let source = dir.path().join("plain.txt");
    fs::write(&source, vec![0x41u8; 10_000]).unwrap();

    vol.add_file(&source, "doc", Some("pw")).unwrap();

    let files = vol.list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "doc");
    assert_eq!(files[0].original_size, 10_000);
    assert_eq!(files[0].encrypted_size, 10_016); // PKCS#7 pads up to the next 16-byte boundary

    let out = dir.path().join("out.bin");
    vol.export_file("doc", Some(&out), Some("pw")).unwrap();
    assert_eq!(fs::read(&out).unwrap(), vec![0x41u8; 10_000]);
}

#[test_log::test]
fn scenario_2_wrong_password_export_fails_and_writes_nothing() {
    let (dir, vol) = fresh_volume();
    let source = dir.path().join("plain.txt");
    fs::write(&source, vec![0x41u8; 10_000]).unwrap();
    vol.add_file(&source, "doc", Some("pw")).unwrap();

    let out = dir.path().join("out.bin");
    assert!(matches!(vol.export_file("doc", Some(&out), Some("wrong")), Err(EngineError::AuthError)));
    assert!(!out.exists());
}

#[test_log::test]
fn scenario_3_password_change_round_trip() {
    let (dir, vol) = fresh_volume();
    let source = dir.path().join("plain.txt");
    fs::write(&source, vec![0x41u8; 10_000]).unwrap();
    vol.add_file(&source, "doc", Some("pw")).unwrap();

    vol.reset_password("doc", "pw", "pw2").unwrap();

    let out = dir.path().join("out.bin");
    assert!(matches!(vol.export_file("doc", Some(&out), Some("pw")), Err(EngineError::AuthError)));
    vol.export_file("doc", Some(&out), Some("pw2")).unwrap();
    assert_eq!(fs::read(&out).unwrap(), vec![0x41u8; 10_000]);
}

#[test_log::test]
fn scenario_4_multi_block_file_layout() {
    let (dir, vol) = fresh_volume();
    let source = dir.path().join("big.bin");
    fs::write(&source, vec![0x7Eu8; 10_000]).unwrap();
    vol.add_file(&source, "big", None).unwrap();

    // ceil(10000 / 4087) == 3 blocks; the third carries the 1826-byte remainder.
    let remainder = 10_000 - 2 * DATA_PAYLOAD_PER_BLOCK;
    assert_eq!(remainder, 1_826);

    let out = dir.path().join("big.out");
    vol.export_file("big", Some(&out), None).unwrap();
    assert_eq!(fs::read(&out).unwrap(), vec![0x7Eu8; 10_000]);
}

#[test_log::test]
fn scenario_5_entry_table_fills_then_frees_a_slot() {
    let (dir, vol) = fresh_volume();
    let source = dir.path().join("one_byte.bin");
    fs::write(&source, [0x01u8]).unwrap();

    for i in 0..100 {
        vol.add_file(&source, &format!("f{i}"), None).unwrap();
    }
    assert_eq!(vol.list_files().unwrap().len(), 100);

    assert!(matches!(vol.add_file(&source, "overflow", None), Err(EngineError::NoFreeEntry)));

    vol.delete_file("f0").unwrap();
    vol.add_file(&source, "overflow", None).unwrap();
    assert_eq!(vol.list_files().unwrap().len(), 100);
}
