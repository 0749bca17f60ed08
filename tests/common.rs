//! Test utilities & fixtures.
//! Writes a small two-movie pack into a temp data directory.

use std::path::Path;

use serde_json::json;

pub const PACK_ID: &str = "toons";

/// Pack `toons` lists `toon-2` before `toon-1`; selection follows that order.
#[allow(dead_code)]
pub fn write_fixture(data_dir: &Path) {
    std::fs::create_dir_all(data_dir.join("packs")).unwrap();
    std::fs::create_dir_all(data_dir.join("scripts")).unwrap();

    let toon1 = json!({
        "id": "toon-1",
        "title": "Toon Town",
        "year": 2001,
        "characters": ["ALICE", "BOB", "CAROL", "NARRATOR"],
        "topSpeakingCast": ["ALICE", "BOB"],
        "lines": [
            {"character": "NARRATOR", "text": "Once upon a time."},
            {"character": "ALICE", "text": "Where are we going today?"},
            {"character": "BOB", "text": "Somewhere far away from here."},
            {"character": "ALICE", "text": "I packed sandwiches for everyone."},
            {"character": "CAROL", "text": "Nobody asked about sandwiches."},
            {"character": "BOB", "text": "Then I will eat them all myself."}
        ]
    });
    let toon2 = json!({
        "id": "toon-2",
        "title": "Toon Town Returns",
        "year": 2004,
        "characters": ["ALICE", "DAVE", "EVE"],
        "topCast": ["DAVE", "ALICE"],
        "lines": [
            {"character": "DAVE", "text": "The sequel always starts in the rain."},
            {"character": "ALICE", "text": "At least it is not snowing again."},
            {"character": "EVE", "text": "Umbrellas are for the weak."},
            {"character": "DAVE", "text": "Said nobody who ever got wet."},
            {"character": "ALICE", "text": "Let us get inside before it floods."},
            {"character": "DAVE", "text": "Fine, but I am driving this time."}
        ]
    });
    let pack = json!({
        "id": PACK_ID,
        "name": "Toon Town",
        "type": "series",
        "movies": ["toon-2", "toon-1"],
        "theme": {
            "primary": "#ff9800",
            "bgColor": "#e65100",
            "containerBg": "#fff3e0",
            "accentColor": "#f57c00",
            "btnText": "black",
            "cardGradientStart": "#ff9800",
            "cardGradientEnd": "#f57c00",
            "cardBorder": "#ff9800"
        },
        "tierMessages": {
            "perfect": "Toon genius!",
            "good": "Nice work!",
            "average": "Not bad.",
            "barely": "Phew.",
            "failure": "Back to the cartoons."
        }
    });

    write(&data_dir.join("scripts/toon-1.json"), &toon1);
    write(&data_dir.join("scripts/toon-2.json"), &toon2);
    write(&data_dir.join("packs/toons.json"), &pack);
}

fn write(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}
