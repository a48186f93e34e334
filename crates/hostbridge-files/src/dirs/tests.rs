use super::*;
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> (DirectoryOperations, Arc<SessionRegistry>, Uuid, TempDir) {
    let registry = Arc::new(SessionRegistry::new());
    let ops = DirectoryOperations::new(Arc::clone(&registry));

    let dir = tempfile::tempdir().unwrap();
    let view = registry.create().await;
    registry
        .set_working_dir(view.id, dir.path().to_str().unwrap())
        .await
        .unwrap();

    (ops, registry, view.id, dir)
}

#[tokio::test]
async fn test_create_list_delete() {
    let (ops, _registry, id, dir) = setup().await;

    ops.create(id, "alpha").await.unwrap();
    ops.create(id, "beta/nested").await.unwrap();
    std::fs::write(dir.path().join("afile.txt"), "x").unwrap();

    let names = ops.list(id, ".").await.unwrap();
    assert_eq!(names, vec!["alpha", "beta"]);

    ops.delete(id, "beta").await.unwrap();
    let names = ops.list(id, ".").await.unwrap();
    assert_eq!(names, vec!["alpha"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_create_applies_fixed_mode() {
    use std::os::unix::fs::PermissionsExt;

    let (ops, _registry, id, dir) = setup().await;
    ops.create(id, "outer/inner").await.unwrap();

    for sub in ["outer", "outer/inner"] {
        let mode = std::fs::metadata(dir.path().join(sub))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o755);
    }
}

#[tokio::test]
async fn test_tree_depth_limits() {
    let (ops, _registry, id, dir) = setup().await;

    ops.create(id, "a/b/c").await.unwrap();
    std::fs::write(dir.path().join("a/file.txt"), "hello").unwrap();

    let tree = ops.tree(id, ".", 1).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "a");
    assert!(tree[0].is_dir);
    assert!(tree[0].children.is_none());

    let tree = ops.tree(id, ".", 0).await.unwrap();
    let a = &tree[0];
    let children = a.children.as_ref().unwrap();
    assert_eq!(children.len(), 2);
    let b = children.iter().find(|c| c.name == "b").unwrap();
    assert!(b.children.as_ref().unwrap().iter().any(|c| c.name == "c"));
    let file = children.iter().find(|c| c.name == "file.txt").unwrap();
    assert_eq!(file.size, Some(5));
}

#[tokio::test]
async fn test_size_sums_files() {
    let (ops, _registry, id, dir) = setup().await;

    ops.create(id, "data/sub").await.unwrap();
    std::fs::write(dir.path().join("data/a.txt"), "12345").unwrap();
    std::fs::write(dir.path().join("data/sub/b.txt"), "123").unwrap();

    assert_eq!(ops.size(id, "data").await.unwrap(), 8);
}

#[tokio::test]
async fn test_find_recursive() {
    let (ops, _registry, id, _dir) = setup().await;

    ops.create(id, "src/widgets").await.unwrap();
    ops.create(id, "docs/widgets-old").await.unwrap();
    ops.create(id, "src/other").await.unwrap();

    let matches = ops.find(id, ".", "widgets", true).await.unwrap();
    assert_eq!(matches, vec!["docs/widgets-old", "src/widgets"]);

    let matches = ops.find(id, ".", "widgets", false).await.unwrap();
    assert!(matches.is_empty());

    let matches = ops.find(id, "src", "widgets", false).await.unwrap();
    assert_eq!(matches, vec!["src/widgets"]);
}

#[test]
fn test_entry_serialization() {
    let entry = DirectoryEntry {
        name: "src".into(),
        path: "src".into(),
        size: None,
        is_dir: true,
        children: None,
    };
    let json = serde_json::to_value(&entry).unwrap();
    assert!(json.get("size").is_none());
    assert!(json.get("children").is_none());
    assert_eq!(json["isDir"], serde_json::json!(true));
}
