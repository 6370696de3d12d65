use gpt4batch_cli::manifest::{find_images, write_manifest};
use gpt4batch_cli::model::ManifestRecord;
use std::fs;
use std::path::Path;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"img").unwrap();
}

fn read_records(path: &Path) -> Vec<ManifestRecord> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn single_image_directory_produces_expected_line() {
    let tmp = tempfile::tempdir().unwrap();
    let cats = tmp.path().join("img").join("cats");
    touch(&cats.join("a.png"));
    touch(&cats.join("b.txt"));
    let out = tmp.path().join("out.jsonl");

    let count = write_manifest(&cats, "describe", &out).unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        fs::read_to_string(&out).unwrap(),
        "{\"id\":\"in-0\",\"asks\":[{\"id\":\"ask-0\",\"content\":\"describe\",\"images\":[\"cats/a.png\"]}],\"extra\":\"cats/a.png\"}\n"
    );
}

#[test]
fn one_record_per_matching_file_across_the_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("photos");
    for name in ["a.png", "b.jpg", "c.jpeg", "d.gif", "e.bmp", "f.webp"] {
        touch(&root.join(name));
    }
    touch(&root.join("nested/deeper/g.png"));
    touch(&root.join("nested/h.jpg"));
    touch(&root.join("notes.txt"));
    touch(&root.join("upper.PNG"));
    touch(&root.join("scan.tiff"));
    let out = tmp.path().join("out.jsonl");

    let count = write_manifest(&root, "Tell me!", &out).unwrap();
    assert_eq!(count, 8);

    let recs = read_records(&out);
    assert_eq!(recs.len(), 8);
    for (i, rec) in recs.iter().enumerate() {
        assert_eq!(rec.id, format!("in-{}", i));
        assert_eq!(rec.asks.len(), 1);
        assert_eq!(rec.asks[0].id, format!("ask-{}", i));
        assert_eq!(rec.asks[0].content, "Tell me!");
        assert_eq!(rec.asks[0].images, vec![rec.extra.clone()]);
    }
    assert!(recs.iter().all(|r| !r.extra.ends_with(".PNG")));
    assert!(recs.iter().any(|r| r.extra == "deeper/g.png"));
    assert!(recs.iter().any(|r| r.extra == "nested/h.jpg"));
}

#[test]
fn directory_files_come_before_subdirectories_and_group_by_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("set");
    touch(&root.join("b.jpg"));
    touch(&root.join("c.png"));
    touch(&root.join("a.png"));
    touch(&root.join("aa/z.png"));

    let found: Vec<String> = find_images(&root)
        .iter()
        .map(|p| p.strip_prefix(&root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(found, vec!["a.png", "c.png", "b.jpg", "aa/z.png"]);
}

#[test]
fn existing_output_is_overwritten() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("cats");
    touch(&root.join("a.png"));
    let out = tmp.path().join("out.jsonl");
    fs::write(&out, "stale line 1\nstale line 2\nstale line 3\n").unwrap();

    write_manifest(&root, "describe", &out).unwrap();
    let content = fs::read_to_string(&out).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(!content.contains("stale"));
}

#[test]
fn missing_root_writes_empty_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out.jsonl");

    let count = write_manifest(&tmp.path().join("nope"), "describe", &out).unwrap();
    assert_eq!(count, 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "");
}

#[test]
fn prompt_is_written_verbatim_without_escaping() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("imgs");
    touch(&root.join("x.webp"));
    let out = tmp.path().join("out.jsonl");

    write_manifest(&root, "这张图片里有什么？", &out).unwrap();
    let content = fs::read_to_string(&out).unwrap();
    assert!(content.contains("\"content\":\"这张图片里有什么？\""));
    assert_eq!(read_records(&out)[0].extra, "imgs/x.webp");
}

#[test]
fn root_that_is_a_file_yields_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("lonely.png");
    touch(&file);
    assert!(find_images(&file).is_empty());
}

#[cfg(unix)]
#[test]
fn directory_symlink_with_image_name_is_not_an_image() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("set");
    touch(&root.join("real/a.png"));
    std::os::unix::fs::symlink(root.join("real"), root.join("album.png")).unwrap();

    let found = find_images(&root);
    assert_eq!(found, vec![root.join("real").join("a.png")]);
}

#[cfg(unix)]
#[test]
fn file_symlink_with_image_name_still_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("set");
    touch(&root.join("a.png"));
    std::os::unix::fs::symlink(root.join("a.png"), root.join("b.png")).unwrap();

    assert_eq!(find_images(&root).len(), 2);
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_file_name_resolves_to_the_real_file() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("raw");
    let name = OsStr::from_bytes(b"caf\xe9.png");
    touch(&root.join(name));

    let found = find_images(&root);
    assert_eq!(found.len(), 1);
    assert!(found[0].exists());
    assert_eq!(found[0].file_name(), Some(name));
}
