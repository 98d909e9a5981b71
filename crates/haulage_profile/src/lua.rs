//! Renders a [`TruckProfile`] as an OSRM Lua profile (API version 4).
//!
//! The generated file is self-contained: it does not `require` the helper
//! libraries shipped next to OSRM's stock profiles, so it can live in the data
//! directory mounted into the container.

use crate::{
    access_parser::{
        ACCESS_KEYS, BLOCKED_ACCESS_VALUES, HEIGHT_KEYS, LENGTH_KEYS, WEIGHT_KEYS, WIDTH_KEYS,
    },
    average_speed_parser::HIGHWAY_SPEEDS,
    truck_profile::TruckProfile,
    units::{LENGTH_UNITS, SPEED_UNITS, WEIGHT_UNITS},
};

const PROCESSING: &str = r#"
local no_restriction = {
  none = true, default = true, unsigned = true, below_default = true,
  no_sign = true, no_indications = true, unknown = true,
}
local oneways = { yes = true, ['true'] = true, ['1'] = true }
local twoways = { no = true, ['false'] = true, ['0'] = true }
local reversible = { reversible = true, alternating = true }
local oneway_keys = { 'oneway:hgv', 'oneway:vehicle', 'oneway' }
local maxspeed_keys = { 'maxspeed:hgv', 'maxspeed' }

local function tag_value(way, keys)
  for _, key in ipairs(keys) do
    local value = way:get_value_by_key(key)
    if value and value ~= '' then
      return key, value
    end
  end
  return nil, nil
end

local function parse_with_units(value, units)
  if not value or no_restriction[value] then
    return nil
  end
  local number, unit = string.match(value, '^%s*([%d%.,]+)%s*(.-)%s*$')
  if not number then
    return nil
  end
  number = tonumber((string.gsub(number, ',', '.')))
  local factor = units[unit]
  if not number or not factor or number <= 0 then
    return nil
  end
  return number * factor
end

local function parse_length(value)
  if value then
    local feet, inches = string.match(value, "^%s*(%d+%.?%d*)%s*'%s*(%d*%.?%d*)")
    if feet then
      return tonumber(feet) * 0.3048 + (tonumber(inches) or 0) * 0.0254
    end
  end
  return parse_with_units(value, length_units)
end

local function parse_weight(value)
  return parse_with_units(value, weight_units)
end

local function parse_maxspeed(value)
  if value == 'walk' then
    return 5
  elseif value == 'none' then
    return 150
  end
  return parse_with_units(value, speed_units)
end

local function exceeds(limit, dimension)
  return limit ~= nil and dimension > limit
end

function setup()
  return {
    properties = {
      weight_name = 'duration',
      max_speed_for_map_matching = max_speed / 3.6,
      u_turn_penalty = 20,
      traffic_light_penalty = 2,
      continue_straight_at_waypoint = true,
      use_turn_restrictions = true,
      left_hand_driving = false,
    },
    default_mode = mode.driving,
    default_speed = 10,
  }
end

function process_node(profile, node, result, relations)
  if node:get_value_by_key('highway') == 'traffic_signals' then
    result.traffic_lights = true
  end
end

function process_way(profile, way, result, relations)
  local highway = way:get_value_by_key('highway')
  local base_speed = highway and highway_speeds[highway]
  if not base_speed then
    return
  end
  if highway == 'service' and way:get_value_by_key('service') == 'emergency_access' then
    return
  end
  if way:get_value_by_key('area') == 'yes' or way:get_value_by_key('impassable') == 'yes' then
    return
  end

  local _, access = tag_value(way, access_keys)
  if access and blocked_access[access] then
    return
  end

  local _, height = tag_value(way, height_keys)
  local _, width = tag_value(way, width_keys)
  local _, length = tag_value(way, length_keys)
  local _, weight = tag_value(way, weight_keys)
  if exceeds(parse_length(height), vehicle.height)
    or exceeds(parse_length(width), vehicle.width)
    or exceeds(parse_length(length), vehicle.length)
    or exceeds(parse_weight(weight), vehicle.weight) then
    return
  end

  local _, maxspeed = tag_value(way, maxspeed_keys)
  local speed = parse_maxspeed(maxspeed) or base_speed
  speed = math.min(speed * speed_multiplier, max_speed)

  local _, oneway = tag_value(way, oneway_keys)
  local junction = way:get_value_by_key('junction')
  local forward, backward = true, true
  if oneway == '-1' then
    forward = false
  elseif oneway and oneways[oneway] then
    backward = false
  elseif oneway and twoways[oneway] then
    backward = true
  elseif oneway and reversible[oneway] then
    return
  elseif junction == 'roundabout' or junction == 'circular'
    or highway == 'motorway' or highway == 'motorway_link' then
    backward = false
  end

  result.forward_mode = forward and mode.driving or mode.inaccessible
  result.backward_mode = backward and mode.driving or mode.inaccessible
  result.forward_speed = forward and speed or 0
  result.backward_speed = backward and speed or 0

  local name = way:get_value_by_key('name')
  if name then
    result.name = name
  end
  local ref = way:get_value_by_key('ref')
  if ref then
    result.ref = ref
  end
end

function process_turn(profile, turn)
  if turn.has_traffic_light then
    turn.duration = profile.properties.traffic_light_penalty
  end
  if turn.is_u_turn then
    turn.duration = turn.duration + profile.properties.u_turn_penalty
  end
  turn.weight = turn.duration
end

return {
  setup = setup,
  process_node = process_node,
  process_way = process_way,
  process_turn = process_turn,
}
"#;

fn lua_list(values: &[&str]) -> String {
    let items: Vec<String> = values.iter().map(|value| format!("'{value}'")).collect();
    format!("{{ {} }}", items.join(", "))
}

fn lua_set(values: &[&str]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|value| format!("['{value}'] = true"))
        .collect();
    format!("{{ {} }}", items.join(", "))
}

fn lua_units(units: &[(&str, f64)]) -> String {
    let items: Vec<String> = units
        .iter()
        .map(|(unit, factor)| format!("['{unit}'] = {factor}"))
        .collect();
    format!("{{ {} }}", items.join(", "))
}

pub fn render(profile: &TruckProfile) -> String {
    let vehicle = &profile.vehicle;
    let mut lua = String::new();

    lua.push_str("-- Truck profile for osrm-extract, generated by haulage. Do not edit.\n");
    lua.push_str("api_version = 4\n\n");

    lua.push_str(&format!(
        "local vehicle = {{ height = {}, width = {}, length = {}, weight = {} }}\n",
        vehicle.height, vehicle.width, vehicle.length, vehicle.weight
    ));
    lua.push_str(&format!(
        "local speed_multiplier = {}\n",
        profile.speed_multiplier
    ));
    lua.push_str(&format!("local max_speed = {}\n\n", profile.max_speed_kmh));

    lua.push_str("local highway_speeds = {\n");
    for (highway, speed) in HIGHWAY_SPEEDS.iter() {
        lua.push_str(&format!("  ['{highway}'] = {speed},\n"));
    }
    lua.push_str("}\n\n");

    lua.push_str(&format!("local access_keys = {}\n", lua_list(&ACCESS_KEYS)));
    lua.push_str(&format!(
        "local blocked_access = {}\n",
        lua_set(&BLOCKED_ACCESS_VALUES)
    ));
    lua.push_str(&format!("local height_keys = {}\n", lua_list(&HEIGHT_KEYS)));
    lua.push_str(&format!("local width_keys = {}\n", lua_list(&WIDTH_KEYS)));
    lua.push_str(&format!("local length_keys = {}\n", lua_list(&LENGTH_KEYS)));
    lua.push_str(&format!("local weight_keys = {}\n", lua_list(&WEIGHT_KEYS)));
    lua.push_str(&format!("local length_units = {}\n", lua_units(&LENGTH_UNITS)));
    lua.push_str(&format!("local weight_units = {}\n", lua_units(&WEIGHT_UNITS)));
    lua.push_str(&format!("local speed_units = {}\n", lua_units(&SPEED_UNITS)));

    lua.push_str(PROCESSING);
    lua
}
