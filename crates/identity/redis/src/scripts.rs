/// Lua script for atomically registering a user in both hashes.
///
/// KEYS\[1\] = id -> name hash
/// KEYS\[2\] = name -> id hash
/// KEYS\[3\] = max id counter
/// ARGV\[1\] = user id
/// ARGV\[2\] = username
///
/// Returns 1 on success, 0 if the name exists, -1 if the id is taken.
/// The counter is raised to the id if it lags behind, so a later `INCR`
/// never hands out a stored id.
pub const CREATE_USER: &str = r"
if redis.call('HEXISTS', KEYS[2], ARGV[2]) == 1 then
    return 0
end
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 1 then
    return -1
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
redis.call('HSET', KEYS[2], ARGV[2], ARGV[1])
local id = tonumber(ARGV[1])
local max = tonumber(redis.call('GET', KEYS[3]) or '0')
if max < id then
    redis.call('SET', KEYS[3], ARGV[1])
end
return 1
";
