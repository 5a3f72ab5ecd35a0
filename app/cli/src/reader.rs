//! Line-oriented command loop driving a [`ReaderSession`].

use manga_reader_core::{
    Keymap, LoadState, NavOutcome, OpenRequest, ReaderAction, ReaderAddress, ReaderSession,
    SessionPhase,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
commands:
  <enter> d          next page          a                previous page
  ] [                next / previous chapter
  j <n>, <n>         jump to page       home end         first / last page
  + - 0              zoom in / out / reset
  m                  cycle reading mode p                toggle autoplay
  dl                 download chapter   downloads        list downloads
  rm <chapter>       remove download    r                retry after an error
  s                  status             stats            preload statistics
  q                  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Action(ReaderAction),
    Jump(u32),
    Download,
    Downloads,
    Remove(String),
    Retry,
    Status,
    Stats,
    Help,
    Quit,
}

pub fn parse_command(line: &str, keymap: &Keymap) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return Some(Command::Action(ReaderAction::NextPage));
    }
    if let Ok(page) = line.parse::<u32>() {
        return Some(Command::Jump(page));
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match (word, rest) {
        ("q" | "quit" | "exit", "") => Command::Quit,
        ("h" | "help" | "?", "") => Command::Help,
        ("r" | "retry", "") => Command::Retry,
        ("s" | "status", "") => Command::Status,
        ("stats", "") => Command::Stats,
        ("dl" | "download", "") => Command::Download,
        ("downloads", "") => Command::Downloads,
        ("rm", chapter) if !chapter.is_empty() => Command::Remove(chapter.to_string()),
        ("j" | "goto", page) => Command::Jump(page.parse().ok()?),
        ("home", "") => Command::Action(ReaderAction::FirstPage),
        ("end", "") => Command::Action(ReaderAction::LastPage),
        (key, "") => Command::Action(keymap.resolve(key)?),
        _ => return None,
    };
    Some(command)
}

#[derive(Debug)]
pub struct Reader {
    session: ReaderSession,
    keymap: Keymap,
}

impl Reader {
    pub fn new(session: ReaderSession, keymap: Keymap) -> Self {
        Self { session, keymap }
    }

    pub async fn run(
        &self,
        start: OpenRequest,
        mut navigations: mpsc::UnboundedReceiver<ReaderAddress>,
    ) -> anyhow::Result<()> {
        self.open(start).await;
        println!("type h for help");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                Some(address) = navigations.recv() => {
                    self.open(OpenRequest::from(&address)).await;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    self.session.register_interaction();
                    match parse_command(&line, &self.keymap) {
                        Some(Command::Quit) => break,
                        Some(command) => self.execute(command).await,
                        None => println!("unknown command `{}` (h for help)", line.trim()),
                    }
                }
            }
        }

        self.session.shutdown();
        let stats = self.session.preload_stats();
        tracing::info!(target: "reader", loaded = stats.loaded, failed = stats.failed, retries = stats.retries, "reader closed");
        Ok(())
    }

    async fn open(&self, request: OpenRequest) {
        println!("opening {} ...", request.slug);
        if let Err(err) = self.session.open(request).await {
            tracing::debug!(target: "reader", error = %err, "open failed");
        }
        self.render();
    }

    async fn execute(&self, command: Command) {
        match command {
            Command::Action(action) => {
                let outcome = self.session.apply_action(action);
                self.report(outcome);
            }
            Command::Jump(page) => {
                let outcome = self.session.jump_to_page(page);
                self.report(outcome);
            }
            Command::Download => match self.session.download_current_chapter() {
                Ok(record) => println!("saved {} pages for offline reading", record.pages.len()),
                Err(err) => println!("download failed: {err}"),
            },
            Command::Downloads => {
                let downloads = self.session.offline_store().list_downloads();
                if downloads.is_empty() {
                    println!("no downloads");
                }
                for record in downloads {
                    println!(
                        "{} / {} ({} pages) -> {}?chapter={}",
                        record.manga_title,
                        record.to_chapter().label(),
                        record.pages.len(),
                        record.manga_id,
                        record.chapter_id
                    );
                }
            }
            Command::Remove(chapter_id) => {
                let Some(manga) = self.session.snapshot().manga else {
                    println!("no manga open");
                    return;
                };
                match self.session.offline_store().remove_download(&manga.id, &chapter_id) {
                    Ok(true) => println!("removed {chapter_id}"),
                    Ok(false) => println!("{chapter_id} was not downloaded"),
                    Err(err) => println!("remove failed: {err}"),
                }
            }
            Command::Retry => {
                if let Err(err) = self.session.retry().await {
                    tracing::debug!(target: "reader", error = %err, "retry failed");
                }
                self.render();
            }
            Command::Status => self.render(),
            Command::Stats => match serde_json::to_string_pretty(&self.session.preload_stats()) {
                Ok(text) => println!("{text}"),
                Err(err) => println!("stats unavailable: {err}"),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
    }

    fn report(&self, outcome: NavOutcome) {
        match outcome {
            NavOutcome::Page(_) | NavOutcome::Unchanged => self.render(),
            // The navigation channel reopens the session.
            NavOutcome::Chapter(_) => {}
            NavOutcome::NoNextChapter => println!("this is the last chapter"),
            NavOutcome::NoPrevChapter => println!("this is the first chapter"),
            NavOutcome::NotReady => println!("nothing loaded (r to retry)"),
        }
    }

    fn render(&self) {
        let snapshot = self.session.snapshot();
        match &snapshot.phase {
            SessionPhase::Ready => {}
            SessionPhase::NotFound(reason) => {
                println!("not found: {reason} (r to retry)");
                return;
            }
            SessionPhase::Error(reason) => {
                println!("error: {reason} (r to retry)");
                return;
            }
            phase => {
                println!("{phase:?}");
                return;
            }
        }

        let title = snapshot.manga.as_ref().map(|manga| manga.title.as_str()).unwrap_or("?");
        let chapter =
            snapshot.active_chapter.as_ref().map(|chapter| chapter.label()).unwrap_or_default();
        let mut flags = Vec::new();
        if snapshot.is_offline {
            flags.push("offline");
        }
        if snapshot.catalog_degraded {
            flags.push("no chapter list");
        }
        if snapshot.autoplay {
            flags.push("autoplay");
        }
        println!(
            "{title} | {chapter} | page {}/{} | {:?} | zoom {:.2} {}",
            snapshot.current_page,
            snapshot.total_pages,
            snapshot.mode,
            snapshot.zoom,
            flags.join(", ")
        );
        if snapshot.total_pages == 0 {
            println!("  (no pages available for this chapter)");
        }
        for page in snapshot.visible_pages() {
            let url = snapshot.pages.url_for_page(page).unwrap_or_default();
            let status = match snapshot.load_state(page) {
                LoadState::Loaded(_) => "ready".to_string(),
                LoadState::Failed(placeholder) => format!("failed, showing {placeholder}"),
                LoadState::Loading | LoadState::NotStarted => "loading".to_string(),
            };
            println!("  [{page}] {url} ({status})");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_words_numbers_and_keys() {
        let keymap = Keymap::default();
        assert_eq!(parse_command("", &keymap), Some(Command::Action(ReaderAction::NextPage)));
        assert_eq!(parse_command(" 12 ", &keymap), Some(Command::Jump(12)));
        assert_eq!(parse_command("j 4", &keymap), Some(Command::Jump(4)));
        assert_eq!(parse_command("q", &keymap), Some(Command::Quit));
        assert_eq!(parse_command("dl", &keymap), Some(Command::Download));
        assert_eq!(parse_command("rm c7", &keymap), Some(Command::Remove("c7".into())));
        assert_eq!(parse_command("]", &keymap), Some(Command::Action(ReaderAction::NextChapter)));
        assert_eq!(parse_command("+", &keymap), Some(Command::Action(ReaderAction::ZoomIn)));
        assert_eq!(parse_command("end", &keymap), Some(Command::Action(ReaderAction::LastPage)));
    }

    #[test]
    fn malformed_commands_are_rejected() {
        let keymap = Keymap::default();
        assert_eq!(parse_command("j x", &keymap), None);
        assert_eq!(parse_command("rm", &keymap), None);
        assert_eq!(parse_command("zz", &keymap), None);
        assert_eq!(parse_command("q now", &keymap), None);
    }
}
