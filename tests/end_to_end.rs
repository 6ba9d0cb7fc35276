//! End-to-end scenarios over real TCP sockets, exercising the naming
//! service, registration service, and storage adapter together.

use std::net::SocketAddr;
use std::sync::Arc;

use dfs::naming;
use dfs::naming::registration::RegistrationServiceImpl;
use dfs::naming::service::{NamingServiceImpl, NamingStub};
use dfs::path::Path;
use dfs::rpc::skeleton::Skeleton;
use dfs::storage::service::{StorageDataStub, StorageServer};

struct NamingServer {
    naming: Arc<Skeleton<NamingServiceImpl>>,
    registration: Arc<Skeleton<RegistrationServiceImpl>>,
}

impl NamingServer {
    async fn start() -> (Self, SocketAddr, SocketAddr) {
        let state = naming::new_shared_state();
        let naming = Arc::new(Skeleton::new(
            Arc::new(NamingServiceImpl::new(state.clone())),
            "127.0.0.1:0".parse().unwrap(),
        ));
        let registration = Arc::new(Skeleton::new(
            Arc::new(RegistrationServiceImpl::new(state)),
            "127.0.0.1:0".parse().unwrap(),
        ));
        let naming_addr = naming.start().await.unwrap();
        let registration_addr = registration.start().await.unwrap();
        (Self { naming, registration }, naming_addr, registration_addr)
    }

    async fn stop(&self) {
        self.naming.stop().await;
        self.registration.stop().await;
    }
}

#[tokio::test]
async fn single_file_round_trip() {
    let (naming_server, naming_addr, registration_addr) = NamingServer::start().await;

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("hello.txt"), b"abc").unwrap();
    let storage = StorageServer::new(
        root.path().to_path_buf(),
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );
    storage.start("127.0.0.1", registration_addr).await.unwrap();

    let naming = NamingStub::new(dfs::rpc::stub::RemoteRef::new(naming_addr, "Naming"));
    let listed = naming.list(&Path::root()).await.unwrap();
    assert_eq!(listed, vec!["hello.txt".to_string()]);

    let data_remote = naming.get_storage(&Path::new("/hello.txt").unwrap()).await.unwrap();
    let data = StorageDataStub::new(data_remote);
    assert_eq!(data.size(&Path::new("/hello.txt").unwrap()).await.unwrap(), 3);
    assert_eq!(data.read(&Path::new("/hello.txt").unwrap(), 0, 3).await.unwrap(), b"abc");

    storage.stop().await;
    naming_server.stop().await;
}

#[tokio::test]
async fn duplicate_registration_is_pruned_and_first_registrant_keeps_ownership() {
    let (naming_server, naming_addr, registration_addr) = NamingServer::start().await;

    let root_a = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root_a.path().join("a")).unwrap();
    std::fs::write(root_a.path().join("a/b.txt"), b"from-a").unwrap();
    let storage_a = StorageServer::new(
        root_a.path().to_path_buf(),
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );
    storage_a.start("127.0.0.1", registration_addr).await.unwrap();

    let root_b = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root_b.path().join("a")).unwrap();
    std::fs::write(root_b.path().join("a/b.txt"), b"from-b").unwrap();
    std::fs::write(root_b.path().join("c.txt"), b"c").unwrap();
    let storage_b = StorageServer::new(
        root_b.path().to_path_buf(),
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );
    storage_b.start("127.0.0.1", registration_addr).await.unwrap();

    // B's duplicate was deleted locally and its now-empty `a/` pruned.
    assert!(!root_b.path().join("a").exists());
    assert!(root_b.path().join("c.txt").exists());

    let naming = NamingStub::new(dfs::rpc::stub::RemoteRef::new(naming_addr, "Naming"));
    let owner = naming.get_storage(&Path::new("/a/b.txt").unwrap()).await.unwrap();
    let data = StorageDataStub::new(owner);
    assert_eq!(data.read(&Path::new("/a/b.txt").unwrap(), 0, 6).await.unwrap(), b"from-a");

    storage_a.stop().await;
    storage_b.stop().await;
    naming_server.stop().await;
}

#[tokio::test]
async fn create_through_naming_commands_the_registered_server() {
    let (naming_server, naming_addr, registration_addr) = NamingServer::start().await;

    let root = tempfile::tempdir().unwrap();
    let storage = StorageServer::new(
        root.path().to_path_buf(),
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );
    storage.start("127.0.0.1", registration_addr).await.unwrap();

    let naming = NamingStub::new(dfs::rpc::stub::RemoteRef::new(naming_addr, "Naming"));
    assert!(naming.create_file(&Path::new("/x/y.txt").unwrap()).await.unwrap());
    assert!(naming.is_directory(&Path::new("/x").unwrap()).await.unwrap());
    assert!(root.path().join("x/y.txt").exists());

    let owner = naming.get_storage(&Path::new("/x/y.txt").unwrap()).await.unwrap();
    let data = StorageDataStub::new(owner);
    assert_eq!(data.size(&Path::new("/x/y.txt").unwrap()).await.unwrap(), 0);

    storage.stop().await;
    naming_server.stop().await;
}

#[tokio::test]
async fn write_then_read_preserves_disjoint_offsets() {
    let (naming_server, naming_addr, registration_addr) = NamingServer::start().await;

    let root = tempfile::tempdir().unwrap();
    let storage = StorageServer::new(
        root.path().to_path_buf(),
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );
    storage.start("127.0.0.1", registration_addr).await.unwrap();

    let naming = NamingStub::new(dfs::rpc::stub::RemoteRef::new(naming_addr, "Naming"));
    assert!(naming.create_file(&Path::new("/w.txt").unwrap()).await.unwrap());
    let owner = naming.get_storage(&Path::new("/w.txt").unwrap()).await.unwrap();
    let data = StorageDataStub::new(owner);

    data.write(&Path::new("/w.txt").unwrap(), 2, b"bc").await.unwrap();
    data.write(&Path::new("/w.txt").unwrap(), 0, b"a").await.unwrap();
    assert_eq!(data.read(&Path::new("/w.txt").unwrap(), 0, 3).await.unwrap(), b"abc");

    storage.stop().await;
    naming_server.stop().await;
}

#[tokio::test]
async fn delete_cascades_to_every_owning_server() {
    let (naming_server, naming_addr, registration_addr) = NamingServer::start().await;

    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("d/e")).unwrap();
    std::fs::write(root.path().join("d/e/f.txt"), b"f").unwrap();
    std::fs::write(root.path().join("d/e/g.txt"), b"g").unwrap();
    let storage = StorageServer::new(
        root.path().to_path_buf(),
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );
    storage.start("127.0.0.1", registration_addr).await.unwrap();

    let naming = NamingStub::new(dfs::rpc::stub::RemoteRef::new(naming_addr, "Naming"));
    assert!(naming.delete(&Path::new("/d").unwrap()).await.unwrap());
    assert!(naming.is_directory(&Path::new("/d").unwrap()).await.is_err());
    assert!(!root.path().join("d").exists());

    storage.stop().await;
    naming_server.stop().await;
}

#[tokio::test]
async fn skeleton_stop_makes_subsequent_stub_calls_fail() {
    let (naming_server, naming_addr, _registration_addr) = NamingServer::start().await;
    naming_server.stop().await;

    let naming = NamingStub::new(dfs::rpc::stub::RemoteRef::new(naming_addr, "Naming"));
    let err = naming.is_directory(&Path::root()).await.unwrap_err();
    assert!(err.is_rpc_failure());
}

#[tokio::test]
async fn registering_with_a_nonexistent_root_fails() {
    let (naming_server, _naming_addr, registration_addr) = NamingServer::start().await;

    let storage = StorageServer::new(
        std::path::PathBuf::from("/does/not/exist/at/all"),
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );
    let err = storage.start("127.0.0.1", registration_addr).await.unwrap_err();
    assert!(matches!(err, dfs::error::DfsError::NotFound(_)));

    naming_server.stop().await;
}
