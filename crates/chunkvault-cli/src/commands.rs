use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use chunkvault_list::{ChunkedList, ListConfig, ListResult, SharedChunkedList};
use chunkvault_store::{FileRecordStore, RecordStore};
use chunkvault_types::RecordId;
use colored::Colorize;
use serde_json::json;
use tracing::info;

use crate::cli::*;
use crate::config::CliConfig;

type List = SharedChunkedList<String, FileRecordStore>;

/// Everything a command needs: the opened store and the resolved settings.
struct Session {
    store: Arc<FileRecordStore>,
    list_id: RecordId,
    list_config: ListConfig,
    format: OutputFormat,
}

impl Session {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => CliConfig::load(path)?,
            None => CliConfig::default(),
        };
        let path: PathBuf = config.resolve_store_path(cli.store.clone());
        let list_id = config.resolve_list_id(cli.list);
        let store = FileRecordStore::open(&path, config.store.clone())?;
        info!(store = %path.display(), list = %list_id, "session opened");
        Ok(Self {
            store: Arc::new(store),
            list_id,
            list_config: config.list,
            format: cli.format,
        })
    }

    /// The existing list. Fails if it has never been created.
    fn existing_list(&self) -> anyhow::Result<List> {
        if !self.store.exists(&self.list_id)? {
            bail!(
                "list {} not found in {} (run `chunkvault init` first)",
                self.list_id,
                self.store.path().display()
            );
        }
        let list = ChunkedList::open(self.list_id, self.store.as_ref())?;
        Ok(SharedChunkedList::new(list, Arc::clone(&self.store)))
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let session = Session::open(&cli)?;
    match cli.command {
        Command::Init(args) => cmd_init(&session, args),
        Command::Append(args) => cmd_append(&session, args),
        Command::Get(args) => cmd_get(&session, args),
        Command::Size => cmd_size(&session),
        Command::List(args) => cmd_list(&session, args),
        Command::Clear => cmd_clear(&session),
        Command::Stat => cmd_stat(&session),
        Command::Compact => cmd_compact(&session),
    }
}

fn cmd_init(session: &Session, args: InitArgs) -> anyhow::Result<()> {
    if session.store.exists(&session.list_id)? {
        bail!("list {} already exists", session.list_id);
    }
    let config = match args.chunk_size {
        Some(chunk_size) => ListConfig::with_chunk_size(chunk_size),
        None => session.list_config.clone(),
    };
    let list = ChunkedList::<String>::create(session.list_id, &config, session.store.as_ref())?;

    if session.json() {
        println!(
            "{}",
            json!({ "list": list.id().to_string(), "chunk_size": list.chunk_size() })
        );
    } else {
        println!("{} Initialized list {}", "✓".green().bold(), list.id().to_string().cyan());
        println!("  Chunk size: {}", list.chunk_size());
        println!("  Store: {}", session.store.path().display());
    }
    Ok(())
}

fn cmd_append(session: &Session, args: AppendArgs) -> anyhow::Result<()> {
    let list: List = SharedChunkedList::open_or_create(
        session.list_id,
        &session.list_config,
        Arc::clone(&session.store),
    )?;
    let count = args.items.len();
    list.append_all(args.items)?;
    let size = list.size()?;

    if session.json() {
        println!("{}", json!({ "appended": count, "size": size }));
    } else {
        println!("{} Appended {} item(s); size is now {}", "✓".green(), count, size.to_string().bold());
    }
    Ok(())
}

fn cmd_get(session: &Session, args: GetArgs) -> anyhow::Result<()> {
    let item = session.existing_list()?.get(args.index)?;
    if session.json() {
        println!("{}", json!({ "index": args.index, "item": item }));
    } else {
        println!("{item}");
    }
    Ok(())
}

fn cmd_size(session: &Session) -> anyhow::Result<()> {
    let size = session.existing_list()?.size()?;
    if session.json() {
        println!("{}", json!({ "size": size }));
    } else {
        println!("{size}");
    }
    Ok(())
}

fn cmd_list(session: &Session, args: ListArgs) -> anyhow::Result<()> {
    let limit = args.limit.unwrap_or(usize::MAX);
    let items = session.existing_list()?.read(|list, store| {
        list.iter_from(args.offset, store)
            .take(limit)
            .map(|item| item.cloned())
            .collect::<ListResult<Vec<String>>>()
    })?;

    if session.json() {
        println!("{}", json!({ "offset": args.offset, "items": items }));
    } else if items.is_empty() {
        println!("No items.");
    } else {
        for (i, item) in (args.offset..).zip(&items) {
            println!("{:>8}  {}", i.to_string().dimmed(), item);
        }
    }
    Ok(())
}

fn cmd_clear(session: &Session) -> anyhow::Result<()> {
    let deleted = session.existing_list()?.clear()?;
    if session.json() {
        println!("{}", json!({ "deleted_chunks": deleted }));
    } else {
        println!("{} Cleared list; {} chunk record(s) deleted", "✓".green(), deleted);
    }
    Ok(())
}

fn cmd_stat(session: &Session) -> anyhow::Result<()> {
    let list = session.existing_list()?;
    let (chunk_size, chunk_count) = list.read(|l, _| Ok((l.chunk_size(), l.chunk_count())))?;
    let size = list.size()?;
    let store = session.store.as_ref();

    if session.json() {
        println!(
            "{}",
            json!({
                "list": session.list_id.to_string(),
                "chunk_size": chunk_size,
                "chunks": chunk_count,
                "size": size,
                "store": {
                    "path": store.path().display().to_string(),
                    "records": store.len(),
                    "log_bytes": store.log_size(),
                    "dead_bytes": store.dead_bytes(),
                },
            })
        );
    } else {
        println!("List {}", session.list_id.to_string().cyan().bold());
        println!("  Items: {}", size.to_string().bold());
        println!("  Chunks: {chunk_count} (chunk size {chunk_size})");
        println!("Store {}", store.path().display().to_string().bold());
        println!("  Records: {}", store.len());
        println!("  Log: {} bytes ({} superseded)", store.log_size(), store.dead_bytes());
    }
    Ok(())
}

fn cmd_compact(session: &Session) -> anyhow::Result<()> {
    let stats = session.store.compact()?;
    if session.json() {
        println!(
            "{}",
            json!({
                "live_records": stats.live_records,
                "reclaimed_bytes": stats.reclaimed_bytes,
            })
        );
    } else {
        println!(
            "{} Compacted: {} live record(s), {} bytes reclaimed",
            "✓".green().bold(),
            stats.live_records,
            stats.reclaimed_bytes
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkvault_store::FileStoreConfig;
    use clap::Parser;
    use std::path::Path;

    fn run(store: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["chunkvault", "--store", store.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    fn reopen(store: &Path, id: RecordId) -> (FileRecordStore, ChunkedList<String>) {
        let store = FileRecordStore::open(store, FileStoreConfig::default()).unwrap();
        let list = ChunkedList::open(id, &store).unwrap();
        (store, list)
    }

    fn contents(store: &FileRecordStore, list: &ChunkedList<String>) -> Vec<String> {
        list.iter(store).map(|r| r.unwrap().clone()).collect()
    }

    #[test]
    fn init_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.log");

        run(&path, &["init", "--chunk-size", "2"]).unwrap();
        run(&path, &["append", "a", "b", "c"]).unwrap();
        run(&path, &["append", "d"]).unwrap();
        run(&path, &["get", "3"]).unwrap();
        run(&path, &["--format", "json", "list", "--offset", "1"]).unwrap();
        run(&path, &["stat"]).unwrap();

        let (store, list) = reopen(&path, crate::config::DEFAULT_LIST_ID);
        assert_eq!(list.chunk_size(), 2);
        assert_eq!(list.chunk_count(), 2);
        assert_eq!(contents(&store, &list), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.log");
        run(&path, &["init"]).unwrap();
        assert!(run(&path, &["init"]).is_err());
    }

    #[test]
    fn reads_require_an_existing_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.log");
        let err = run(&path, &["size"]).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn get_past_end_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.log");
        run(&path, &["append", "only"]).unwrap();
        assert!(run(&path, &["get", "1"]).is_err());
    }

    #[test]
    fn clear_then_compact_reclaims_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.log");
        run(&path, &["init", "--chunk-size", "1"]).unwrap();
        run(&path, &["append", "x", "y", "z"]).unwrap();
        run(&path, &["clear"]).unwrap();
        run(&path, &["compact"]).unwrap();

        let (store, list) = reopen(&path, crate::config::DEFAULT_LIST_ID);
        assert!(list.is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.dead_bytes(), 0);
    }

    #[test]
    fn separate_lists_share_one_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.log");
        let other = RecordId::from_u128(42);
        let other_arg = other.to_string();

        run(&path, &["append", "first"]).unwrap();
        run(&path, &["--list", &other_arg, "append", "second"]).unwrap();

        let (store, list) = reopen(&path, other);
        assert_eq!(contents(&store, &list), vec!["second"]);
        let default = ChunkedList::<String>::open(crate::config::DEFAULT_LIST_ID, &store).unwrap();
        assert_eq!(contents(&store, &default), vec!["first"]);
    }

    #[test]
    fn config_file_sets_store_and_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("from-config.log");
        let config_path = dir.path().join("chunkvault.toml");
        std::fs::write(
            &config_path,
            format!(
                "store_path = {:?}\n[list]\nchunk_size = 3\n",
                store_path.to_str().unwrap()
            ),
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "chunkvault",
            "--config",
            config_path.to_str().unwrap(),
            "append",
            "a",
            "b",
            "c",
            "d",
        ])
        .unwrap();
        run_command(cli).unwrap();

        let (_, list) = reopen(&store_path, crate::config::DEFAULT_LIST_ID);
        assert_eq!(list.chunk_size(), 3);
        assert_eq!(list.chunk_count(), 2);
    }
}
