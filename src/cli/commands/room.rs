use crate::config::Config;
use crate::domain::RoomType;
use crate::models::room::NewRoom;
use crate::open_store;

use super::resolve_user;

pub async fn cmd_room_add(
    config: &Config,
    name: Option<String>,
    room_type: RoomType,
    owners: Vec<String>,
    members: Vec<String>,
    agent: Option<String>,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;

    let mut room = NewRoom::new(name.as_deref(), room_type);
    for key in &owners {
        room = room.owner(&resolve_user(&store, key).await?.id);
    }
    for key in &members {
        room = room.member(&resolve_user(&store, key).await?.id);
    }
    if let Some(key) = &agent {
        let agent = resolve_user(&store, key).await?.id;
        room = room.member(&agent).served_by(&agent);
    }

    let participants = room.participants().len();
    let room = store.create_room(room).await?;

    println!(
        "Created {} room {} ({} participant(s))",
        room.room_type, room.id, participants
    );
    Ok(())
}

pub async fn cmd_room_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let rooms = store.list_rooms().await?;

    if rooms.is_empty() {
        println!("No rooms.");
        println!();
        println!("Add one with: warden room add --name general --owner <user>");
        return Ok(());
    }

    println!("Rooms ({} total)", rooms.len());
    println!("{:-<70}", "");

    for room in rooms {
        let owners = store.count_room_owners(&room.id).await.unwrap_or(0);
        let members = store.count_room_members(&room.id).await.unwrap_or(0);

        let mut flags = Vec::new();
        if room.read_only {
            flags.push("read-only");
        }
        if room.room_type.is_livechat() {
            flags.push(if room.open { "open" } else { "closed" });
        }

        println!(
            "{} [{}]{}",
            room.name.as_deref().unwrap_or("(unnamed)"),
            room.room_type,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
        println!(
            "  ID: {} | Owners: {} | Members: {}",
            room.id, owners, members
        );
    }

    Ok(())
}
