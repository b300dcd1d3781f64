//! Line-oriented driver over the commands. Plain lines go to the active
//! conversation; lines starting with `/` are commands.

use crate::commands::{chat, learn_box, scribbles, settings, task_track, AppError};
use crate::db::models::{ContentItem, DayOfWeek, Message, ScribbleNote, Sender};
use crate::learn_box::NewItem;
use crate::media::MediaFile;
use crate::AppState;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Chat:
  <text>                     send to the active conversation
  /attach <path> [text]      send a file (image, video or audio) with optional text
  /new                       start a conversation
  /list                      list conversations, newest first
  /use <id>                  switch conversation
  /delete <id>               delete a conversation
  /history                   show the active conversation
Learn Box:
  /sections [query]          list sections, optionally filtered by title
  /section <title>           add a section
  /note <section> <text>     add a text note
  /link <section> <url>      add a link
  /map <section>             generate a mind map
  /clear-map <section>       clear a mind map
Task Track:
  /tasks [query]             list tasks, optionally filtered
  /task <text>               add a task
  /done <id>                 toggle a task's completion
  /drop-task <id>            delete a task
  /schedule                  show the weekly schedule
  /plan <day> <subject>      add a subject to a day
  /unplan <day> <id>         remove a subject from a day
Quick Scribble:
  /scribbles [query]         list subjects, matching names and notes
  /scribble <name>           add a subject
  /jot <subject> <text>      add a text note
  /jot-link <subject> <url>  add a link note
  /unjot <subject> <note>    delete a note
Settings:
  /settings                  show settings
  /set <key> <value>         change a setting
/help, /quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Say(String),
    Attach { path: PathBuf, text: String },
    New,
    List,
    Use(String),
    Delete(String),
    History,
    Sections(Option<String>),
    AddSection(String),
    Note { section: String, text: String },
    Link { section: String, url: String },
    Map(String),
    ClearMap(String),
    Tasks(Option<String>),
    AddTask(String),
    ToggleTask(String),
    DeleteTask(String),
    Schedule,
    Plan { day: DayOfWeek, name: String },
    Unplan { day: DayOfWeek, id: String },
    Scribbles(Option<String>),
    AddScribble(String),
    Jot { subject: String, text: String },
    JotLink { subject: String, url: String },
    Unjot { subject: String, note: String },
    Settings,
    Set { key: String, value: String },
    Help,
    Quit,
    Usage(&'static str),
    Unknown(String),
}

fn split_first(rest: &str) -> (String, String) {
    let rest = rest.trim();
    match rest.split_once(char::is_whitespace) {
        Some((head, tail)) => (head.to_string(), tail.trim().to_string()),
        None => (rest.to_string(), String::new()),
    }
}

fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Command::Say(line.to_string()));
    };
    let (name, rest) = split_first(command);
    let arg = || (!rest.is_empty()).then(|| rest.clone());
    let pair = || {
        let (head, tail) = split_first(&rest);
        (!head.is_empty() && !tail.is_empty()).then_some((head, tail))
    };
    let parsed = match name.as_str() {
        "attach" => match arg() {
            Some(rest) => {
                let (path, text) = split_first(&rest);
                Command::Attach {
                    path: PathBuf::from(path),
                    text,
                }
            }
            None => Command::Usage("/attach <path> [text]"),
        },
        "new" => Command::New,
        "list" => Command::List,
        "use" => arg().map_or(Command::Usage("/use <id>"), Command::Use),
        "delete" => arg().map_or(Command::Usage("/delete <id>"), Command::Delete),
        "history" => Command::History,
        "sections" => Command::Sections(arg()),
        "section" => arg().map_or(Command::Usage("/section <title>"), Command::AddSection),
        "note" => pair().map_or(Command::Usage("/note <section> <text>"), |(section, text)| {
            Command::Note { section, text }
        }),
        "link" => pair().map_or(Command::Usage("/link <section> <url>"), |(section, url)| {
            Command::Link { section, url }
        }),
        "map" => arg().map_or(Command::Usage("/map <section>"), Command::Map),
        "clear-map" => arg().map_or(Command::Usage("/clear-map <section>"), Command::ClearMap),
        "tasks" => Command::Tasks(arg()),
        "task" => arg().map_or(Command::Usage("/task <text>"), Command::AddTask),
        "done" => arg().map_or(Command::Usage("/done <id>"), Command::ToggleTask),
        "drop-task" => arg().map_or(Command::Usage("/drop-task <id>"), Command::DeleteTask),
        "schedule" => Command::Schedule,
        "plan" | "unplan" => {
            let usage = if name == "plan" {
                "/plan <day> <subject>"
            } else {
                "/unplan <day> <id>"
            };
            match pair().and_then(|(day, tail)| DayOfWeek::from_name(&day).map(|d| (d, tail))) {
                Some((day, name_or_id)) if name == "plan" => Command::Plan {
                    day,
                    name: name_or_id,
                },
                Some((day, id)) => Command::Unplan { day, id },
                None => Command::Usage(usage),
            }
        }
        "scribbles" => Command::Scribbles(arg()),
        "scribble" => arg().map_or(Command::Usage("/scribble <name>"), Command::AddScribble),
        "jot" => pair().map_or(Command::Usage("/jot <subject> <text>"), |(subject, text)| {
            Command::Jot { subject, text }
        }),
        "jot-link" => pair().map_or(Command::Usage("/jot-link <subject> <url>"), |(subject, url)| {
            Command::JotLink { subject, url }
        }),
        "unjot" => pair().map_or(Command::Usage("/unjot <subject> <note>"), |(subject, note)| {
            Command::Unjot { subject, note }
        }),
        "settings" => Command::Settings,
        "set" => pair().map_or(Command::Usage("/set <key> <value>"), |(key, value)| {
            Command::Set { key, value }
        }),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    };
    Some(parsed)
}

pub(crate) async fn run(state: &AppState) -> Result<(), AppError> {
    println!("Learning Pal ready. Type /help for commands.");
    if let Some(conversation) = state.conversations.active_conversation() {
        print_messages(&conversation.messages);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse(&line) else {
            continue;
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = execute(state, command).await {
            println!("error: {e}");
        }
    }
    Ok(())
}

async fn execute(state: &AppState, command: Command) -> Result<(), AppError> {
    match command {
        Command::Say(text) => send(state, &text, None).await?,
        Command::Attach { path, text } => {
            send(state, &text, Some(MediaFile::from_path(path, None))).await?
        }
        Command::New => {
            let conversation = chat::create_conversation(state)?;
            print_messages(&conversation.messages);
        }
        Command::List => {
            let active = state.conversations.active_id();
            for conversation in &chat::list_conversations(state) {
                let marker = if active.as_deref() == Some(conversation.id.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!(
                    "{marker} {}  {}  {}",
                    conversation.id,
                    conversation.start_time.format("%Y-%m-%d %H:%M"),
                    conversation.title()
                );
            }
        }
        Command::Use(id) => {
            if chat::select_conversation(state, &id) {
                print_messages(&chat::get_messages(state, &id)?);
            } else {
                println!("no conversation {id}");
            }
        }
        Command::Delete(id) => chat::delete_conversation(state, &id)?,
        Command::History => {
            if let Some(id) = state.conversations.active_id() {
                print_messages(&chat::get_messages(state, &id)?);
            }
        }
        Command::Sections(query) => {
            for section in learn_box::list_sections(state, query.as_deref()) {
                println!("[{}] {}", section.id, section.title);
                for item in &section.items {
                    println!("    {}", describe(item));
                }
                if !section.mind_map.is_empty() {
                    println!("    mind map:\n{}", indent(&section.mind_map));
                }
            }
        }
        Command::AddSection(title) => {
            let section = learn_box::add_section(state, &title)?;
            println!("added section [{}] {}", section.id, section.title);
        }
        Command::Note { section, text } => {
            learn_box::add_item(state, &section, NewItem::Text(text))?;
        }
        Command::Link { section, url } => {
            learn_box::add_item(state, &section, NewItem::Link(url))?;
        }
        Command::Map(section) => {
            println!("generating...");
            let diagram = learn_box::generate_mind_map(state, &section).await?;
            println!("{}", indent(&diagram));
        }
        Command::ClearMap(section) => learn_box::clear_mind_map(state, &section)?,
        Command::Tasks(query) => {
            for task in task_track::list_tasks(state, query.as_deref()) {
                let mark = if task.completed { 'x' } else { ' ' };
                println!("[{mark}] {}  {}", task.id, task.text);
            }
        }
        Command::AddTask(text) => {
            let task = task_track::add_task(state, &text)?;
            println!("added task {}", task.id);
        }
        Command::ToggleTask(id) => {
            let done = task_track::toggle_task(state, &id)?;
            println!("{id} {}", if done { "done" } else { "reopened" });
        }
        Command::DeleteTask(id) => task_track::delete_task(state, &id)?,
        Command::Schedule => {
            for (day, subjects) in task_track::get_schedule(state).iter() {
                let names: Vec<_> = subjects
                    .iter()
                    .map(|s| format!("{} ({})", s.name, s.id))
                    .collect();
                println!("{:<9} {}", day.name(), names.join(", "));
            }
        }
        Command::Plan { day, name } => {
            task_track::add_subject(state, day, &name)?;
        }
        Command::Unplan { day, id } => task_track::remove_subject(state, day, &id)?,
        Command::Scribbles(query) => {
            for subject in scribbles::list_scribbles(state, query.as_deref()) {
                println!("[{}] {}", subject.id, subject.name);
                for note in &subject.notes {
                    let kind = match note {
                        ScribbleNote::Text { .. } => "text",
                        ScribbleNote::Link { .. } => "link",
                    };
                    println!("    {} {kind}: {}", note.id(), note.body());
                }
            }
        }
        Command::AddScribble(name) => {
            let subject = scribbles::add_scribble(state, &name)?;
            println!("added subject [{}] {}", subject.id, subject.name);
        }
        Command::Jot { subject, text } => {
            scribbles::add_text_note(state, &subject, &text)?;
        }
        Command::JotLink { subject, url } => {
            scribbles::add_link_note(state, &subject, &url)?;
        }
        Command::Unjot { subject, note } => scribbles::delete_note(state, &subject, &note)?,
        Command::Settings => {
            for (key, value) in settings::get_settings(state)? {
                println!("{key} = {value}");
            }
        }
        Command::Set { key, value } => settings::set_setting(state, &key, &value)?,
        Command::Help => println!("{HELP}"),
        Command::Usage(usage) => println!("usage: {usage}"),
        Command::Unknown(name) => println!("unknown command /{name}, try /help"),
        Command::Quit => {}
    }
    Ok(())
}

async fn send(state: &AppState, text: &str, attachment: Option<MediaFile>) -> Result<(), AppError> {
    let id = match state.conversations.active_id() {
        Some(id) => id,
        None => chat::create_conversation(state)?.id,
    };
    let reply = chat::send_message(state, &id, text, attachment).await?;
    print_messages(std::slice::from_ref(&reply));
    Ok(())
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "pal",
        };
        if let Some(media) = &message.media {
            println!("{who}: [{:?} attachment, {}]", media.kind, media.mime_type);
        }
        if !message.text.is_empty() {
            println!("{who}: {}", message.text);
        }
        for source in message.sources.iter().flatten() {
            match &source.uri {
                Some(uri) => println!("    source: {} <{uri}>", source.label()),
                None => println!("    source: {}", source.label()),
            }
        }
    }
}

fn describe(item: &ContentItem) -> String {
    match item {
        ContentItem::Text { id, content } => format!("{id} text: {content}"),
        ContentItem::Link { id, url } => format!("{id} link: {url}"),
        ContentItem::File { id, name, .. } => format!("{id} file: {name}"),
        ContentItem::Video { id, url } => format!("{id} video: {url}"),
        ContentItem::Image { id, .. } => format!("{id} image"),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("      {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_chat() {
        assert_eq!(parse("  hello there "), Some(Command::Say("hello there".into())));
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            parse("/attach ./cat.png what is this?"),
            Some(Command::Attach {
                path: PathBuf::from("./cat.png"),
                text: "what is this?".into(),
            })
        );
        assert_eq!(
            parse("/note 2 Pythagoras: a² + b² = c²"),
            Some(Command::Note {
                section: "2".into(),
                text: "Pythagoras: a² + b² = c²".into(),
            })
        );
        assert_eq!(
            parse("/set gemini_model gemini-2.5-pro"),
            Some(Command::Set {
                key: "gemini_model".into(),
                value: "gemini-2.5-pro".into(),
            })
        );
        assert_eq!(parse("/sections"), Some(Command::Sections(None)));
        assert_eq!(parse("/sections phy"), Some(Command::Sections(Some("phy".into()))));
    }

    #[test]
    fn missing_arguments_show_usage() {
        assert_eq!(parse("/use"), Some(Command::Usage("/use <id>")));
        assert_eq!(parse("/delete  "), Some(Command::Usage("/delete <id>")));
        assert_eq!(parse("/map"), Some(Command::Usage("/map <section>")));
        assert_eq!(parse("/attach"), Some(Command::Usage("/attach <path> [text]")));
        assert_eq!(parse("/note 2"), Some(Command::Usage("/note <section> <text>")));
        assert_eq!(parse("/set gemini_model"), Some(Command::Usage("/set <key> <value>")));
        assert_eq!(parse("/frobnicate"), Some(Command::Unknown("frobnicate".into())));
    }

    #[test]
    fn task_and_scribble_commands() {
        assert_eq!(parse("/task Read chapter 4"), Some(Command::AddTask("Read chapter 4".into())));
        assert_eq!(parse("/tasks"), Some(Command::Tasks(None)));
        assert_eq!(
            parse("/plan mon Organic Chemistry"),
            Some(Command::Plan {
                day: DayOfWeek::Monday,
                name: "Organic Chemistry".into(),
            })
        );
        assert_eq!(
            parse("/unplan Friday s1"),
            Some(Command::Unplan {
                day: DayOfWeek::Friday,
                id: "s1".into(),
            })
        );
        assert_eq!(parse("/plan someday Math"), Some(Command::Usage("/plan <day> <subject>")));
        assert_eq!(
            parse("/jot-link 3 https://nationalgeographic.com"),
            Some(Command::JotLink {
                subject: "3".into(),
                url: "https://nationalgeographic.com".into(),
            })
        );
        assert_eq!(parse("/unjot 1"), Some(Command::Usage("/unjot <subject> <note>")));
    }
}
