//! Canned UDP API replies
//!
//! Data lines follow the masks the cache layer requests, so the replies
//! parse exactly like the server's.

use anidb_cache_core::protocol::Reply;

pub fn anime(episodes: u32, start: i64, end: i64) -> Reply {
    Reply::new(230, "ANIME").with_line(format!("{episodes}|{start}|{end}||{end}"))
}

pub fn no_such_anime() -> Reply {
    Reply::new(330, "NO SUCH ANIME")
}

pub fn episode(eid: u32, aid: u32) -> Reply {
    Reply::new(240, "EPISODE").with_line(format!("{eid}|{aid}|24|850|12|01|Episode|||0"))
}

pub fn no_such_episode() -> Reply {
    Reply::new(340, "NO SUCH EPISODE")
}

pub fn no_such_file() -> Reply {
    Reply::new(320, "NO SUCH FILE")
}

/// `322 MULTIPLE FILES FOUND` listing `fids`
pub fn multiple_files(fids: &[u32]) -> Reply {
    let line = fids
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("|");
    Reply::new(322, "MULTIPLE FILES FOUND").with_line(line)
}

pub fn group(gid: u32, name: &str, short_name: &str) -> Reply {
    Reply::new(250, "GROUP").with_line(format!(
        "{gid}|812|60|20|150|{name}|{short_name}|#{short_name}|irc.rizon.net|http://{short_name}.example||1104537600|0|1|1230768000|1230768000|"
    ))
}

pub fn no_such_group() -> Reply {
    Reply::new(350, "NO SUCH GROUP")
}

pub fn user(uid: u32, name: &str) -> Reply {
    Reply::new(295, "USER").with_line(format!("{uid}|{name}"))
}

pub fn no_such_user() -> Reply {
    Reply::new(394, "NO SUCH USER")
}

/// `221 MYLIST` for one entry in the HDD state
pub fn mylist_entry(lid: u32, fid: u32, eid: u32, aid: u32, gid: u32) -> Reply {
    Reply::new(221, "MYLIST").with_line(format!(
        "{lid}|{fid}|{eid}|{aid}|{gid}|1230768000|1|0|shelf||note|0"
    ))
}

pub fn no_such_entry() -> Reply {
    Reply::new(321, "NO SUCH ENTRY")
}

/// `312 MULTIPLE MYLIST ENTRIES` summary of an anime
///
/// `groups` pairs group names with the episodes they cover.
pub fn mylist_summary(title: &str, on_hdd: &str, watched: &str, groups: &[(&str, &str)]) -> Reply {
    let mut line = format!("{title}|{on_hdd}||{on_hdd}|||{watched}");
    for (name, episodes) in groups {
        line.push_str(&format!("|{name}|{episodes}"));
    }
    Reply::new(312, "MULTIPLE MYLIST ENTRIES").with_line(line)
}

pub fn mylist_added(lid: u32) -> Reply {
    Reply::new(210, "MYLIST ENTRY ADDED").with_line(lid.to_string())
}

/// `310 FILE ALREADY IN MYLIST` with the existing entry
pub fn mylist_already_listed(lid: u32, fid: u32, eid: u32, aid: u32, gid: u32) -> Reply {
    Reply::new(310, "FILE ALREADY IN MYLIST").with_line(format!(
        "{lid}|{fid}|{eid}|{aid}|{gid}|1230768000|1|0|shelf||note|0"
    ))
}

pub fn mylist_edited(count: u32) -> Reply {
    Reply::new(311, "MYLIST ENTRY EDITED").with_line(count.to_string())
}

pub fn mylist_deleted(count: u32) -> Reply {
    Reply::new(211, "MYLIST ENTRY DELETED").with_line(count.to_string())
}

pub fn no_such_mylist_entry() -> Reply {
    Reply::new(411, "NO SUCH MYLIST ENTRY")
}

pub fn mylist_stats(anime: u32, episodes: u32, files: u32, viewed_episodes: u32) -> Reply {
    Reply::new(222, "MYLIST STATS").with_line(format!(
        "{anime}|{episodes}|{files}|2048|0|0|0|0|120|300|5|10|50|{viewed_episodes}|3|1|1440"
    ))
}

pub fn login_failed() -> Reply {
    Reply::new(500, "LOGIN FAILED")
}

pub fn invalid_session() -> Reply {
    Reply::new(501, "LOGIN FIRST")
}

pub fn client_banned() -> Reply {
    Reply::new(504, "CLIENT BANNED - flooding")
}

pub fn banned() -> Reply {
    Reply::new(555, "BANNED")
}

pub fn server_busy() -> Reply {
    Reply::new(602, "SERVER BUSY - TRY AGAIN LATER")
}

pub fn illegal_input() -> Reply {
    Reply::new(505, "ILLEGAL INPUT OR ACCESS DENIED")
}

/// Data line of a 220 FILE reply
///
/// Defaults describe a complete single-episode 720p release; override the
/// fields a test cares about.
#[derive(Debug, Clone)]
pub struct FileLineBuilder {
    fid: u32,
    aid: u32,
    eid: u32,
    gid: u32,
    related: Vec<(u32, u32)>,
    state: u32,
    size: u64,
    ed2k: String,
    resolution: String,
    epno: String,
}

impl FileLineBuilder {
    pub fn new(fid: u32, aid: u32, eid: u32, gid: u32) -> Self {
        Self {
            fid,
            aid,
            eid,
            gid,
            related: Vec::new(),
            state: 1,
            size: 366_733_312,
            ed2k: "1ab2c3d4e5f6a7b8c9d0e1f2a3b4c5d6".to_string(),
            resolution: "1280x720".to_string(),
            epno: "01".to_string(),
        }
    }

    /// Another episode the file covers, with the covered share in percent
    pub fn related(mut self, eid: u32, percent: u32) -> Self {
        self.related.push((eid, percent));
        self
    }

    pub fn state(mut self, state: u32) -> Self {
        self.state = state;
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn ed2k(mut self, ed2k: &str) -> Self {
        self.ed2k = ed2k.to_string();
        self
    }

    pub fn resolution(mut self, resolution: &str) -> Self {
        self.resolution = resolution.to_string();
        self
    }

    pub fn epno(mut self, epno: &str) -> Self {
        self.epno = epno.to_string();
        self
    }

    pub fn line(&self) -> String {
        let related = self
            .related
            .iter()
            .map(|(eid, percent)| format!("{eid},{percent}"))
            .collect::<Vec<_>>()
            .join("'");
        format!(
            "{}|{}|{}|{}|{related}|0|{}|{}|{}|sha1|abcd1234|8|www|AAC|128|H264/AVC|2000|{}|mkv|japanese|english|1440|1230768000|{}",
            self.fid,
            self.aid,
            self.eid,
            self.gid,
            self.state,
            self.size,
            self.ed2k,
            self.resolution,
            self.epno,
        )
    }

    /// The complete `220 FILE` reply
    pub fn reply(&self) -> Reply {
        Reply::new(220, "FILE").with_line(self.line())
    }
}
