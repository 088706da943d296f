//! `info.csv` and `chats.csv`.

use std::path::Path;

use crate::error::Result;
use crate::models::FullChat;

use super::csv_writer;

pub const INFO_FILE: &str = "info.csv";
pub const CHATS_FILE: &str = "chats.csv";

/// Writes the group description.
pub fn write_chat_info(full_chat: &FullChat, dir: &Path) -> Result<()> {
    let mut writer = csv_writer(&dir.join(INFO_FILE))?;
    writer.write_record(["about"])?;
    writer.write_record([full_chat.about.as_str()])?;
    writer.flush()?;
    Ok(())
}

/// Writes the related chats. Empty slots are skipped but keep their order.
pub fn write_chats(full_chat: &FullChat, dir: &Path) -> Result<usize> {
    let mut writer = csv_writer(&dir.join(CHATS_FILE))?;
    writer.write_record(["order", "id", "title"])?;

    let mut written = 0;
    for (order, chat) in full_chat.chats.iter().enumerate() {
        let Some(chat) = chat else { continue };
        writer.write_record([order.to_string(), chat.id.to_string(), chat.title.clone()])?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatRef;
    use tempfile::tempdir;

    #[test]
    fn test_info_quotes_multiline_about() {
        let dir = tempdir().unwrap();
        let full = FullChat {
            about: "Line one\nLine, two".into(),
            chats: Vec::new(),
        };
        write_chat_info(&full, dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(INFO_FILE)).unwrap();
        assert_eq!(content, "about\n\"Line one\nLine, two\"\n");
    }

    #[test]
    fn test_chats_keep_enumeration_order() {
        let dir = tempdir().unwrap();
        let full = FullChat {
            about: String::new(),
            chats: vec![
                Some(ChatRef {
                    id: 10,
                    title: "Main".into(),
                }),
                None,
                Some(ChatRef {
                    id: 12,
                    title: "Linked".into(),
                }),
            ],
        };
        let written = write_chats(&full, dir.path()).unwrap();

        assert_eq!(written, 2);
        let content = std::fs::read_to_string(dir.path().join(CHATS_FILE)).unwrap();
        assert_eq!(content, "order,id,title\n0,10,Main\n2,12,Linked\n");
    }
}
